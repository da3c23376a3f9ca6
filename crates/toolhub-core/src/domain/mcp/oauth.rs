//! OAuth state for HTTP MCP servers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens issued by a server's authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Bearer token sent on every request.
    pub access_token: String,

    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiry computed from `expires_in` at issue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthTokens {
    /// Create bearer tokens with no expiry.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        }
    }

    /// Whether the access token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        // Servers compare the scheme case-insensitively, but some only accept "Bearer".
        if self.token_type.eq_ignore_ascii_case("bearer") {
            format!("Bearer {}", self.access_token)
        } else {
            format!("{} {}", self.token_type, self.access_token)
        }
    }
}

/// A pending authorization-code flow, keyed by its `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSession {
    /// Opaque `state` parameter echoed back by the authorization server.
    pub state: String,
    /// Server the tokens will belong to.
    pub server_id: String,
    /// PKCE verifier matching the challenge in the authorization URL.
    pub code_verifier: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub token_endpoint: String,
    pub created_at: DateTime<Utc>,
}
