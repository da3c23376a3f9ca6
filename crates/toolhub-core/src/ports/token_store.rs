//! OAuth token store port.
//!
//! Tokens are written by whichever component completes the authorization
//! code exchange; client handles only read them.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::mcp::{OAuthSession, OAuthTokens};

/// Errors from the token store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenStoreError {
    /// Storage backend error.
    #[error("Token storage error: {0}")]
    Internal(String),
}

/// Persistence for OAuth tokens and pending authorization sessions.
#[async_trait]
pub trait OAuthTokenStore: Send + Sync {
    /// Tokens for a server, `None` if the server was never authorized.
    async fn get_tokens(&self, server_id: &str) -> Result<Option<OAuthTokens>, TokenStoreError>;

    /// Store (or replace) tokens for a server.
    async fn save_tokens(
        &self,
        server_id: &str,
        tokens: &OAuthTokens,
    ) -> Result<(), TokenStoreError>;

    /// Forget tokens and pending sessions for a server.
    async fn delete_tokens(&self, server_id: &str) -> Result<(), TokenStoreError>;

    /// Record a pending authorization session.
    async fn save_session(&self, session: &OAuthSession) -> Result<(), TokenStoreError>;

    /// Remove and return the session with this `state`.
    async fn take_session(&self, state: &str) -> Result<Option<OAuthSession>, TokenStoreError>;
}
