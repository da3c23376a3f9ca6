//! `SQLite` implementation of the OAuth token store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use toolhub_core::domain::mcp::{OAuthSession, OAuthTokens};
use toolhub_core::ports::{OAuthTokenStore, TokenStoreError};

use super::row_mappers::{format_datetime, parse_datetime, parse_datetime_or_now};

/// `SQLite` implementation of [`OAuthTokenStore`].
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Create a new token store.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    access_token: String,
    token_type: String,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    scope: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    state: String,
    server_id: String,
    code_verifier: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    token_endpoint: String,
    created_at: String,
}

impl From<TokenRow> for OAuthTokens {
    fn from(row: TokenRow) -> Self {
        Self {
            access_token: row.access_token,
            token_type: row.token_type,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at.as_deref().and_then(parse_datetime),
            scope: row.scope,
        }
    }
}

impl From<SessionRow> for OAuthSession {
    fn from(row: SessionRow) -> Self {
        Self {
            state: row.state,
            server_id: row.server_id,
            code_verifier: row.code_verifier,
            client_id: row.client_id,
            client_secret: row.client_secret,
            redirect_uri: row.redirect_uri,
            token_endpoint: row.token_endpoint,
            created_at: parse_datetime_or_now(&row.created_at),
        }
    }
}

fn map_sqlx_error(e: sqlx::Error) -> TokenStoreError {
    TokenStoreError::Internal(e.to_string())
}

#[async_trait]
impl OAuthTokenStore for SqliteTokenStore {
    async fn get_tokens(&self, server_id: &str) -> Result<Option<OAuthTokens>, TokenStoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT access_token, token_type, refresh_token, expires_at, scope \
             FROM mcp_oauth_tokens WHERE server_id = ?",
        )
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(OAuthTokens::from))
    }

    async fn save_tokens(
        &self,
        server_id: &str,
        tokens: &OAuthTokens,
    ) -> Result<(), TokenStoreError> {
        sqlx::query(
            r#"
            INSERT INTO mcp_oauth_tokens
                (server_id, access_token, token_type, refresh_token, expires_at, scope, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(server_id) DO UPDATE SET
                access_token = excluded.access_token,
                token_type = excluded.token_type,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(server_id)
        .bind(&tokens.access_token)
        .bind(&tokens.token_type)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at.map(format_datetime))
        .bind(&tokens.scope)
        .bind(format_datetime(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::debug!(server_id = %server_id, "Stored OAuth tokens");
        Ok(())
    }

    async fn delete_tokens(&self, server_id: &str) -> Result<(), TokenStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM mcp_oauth_tokens WHERE server_id = ?")
            .bind(server_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM mcp_oauth_sessions WHERE server_id = ?")
            .bind(server_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn save_session(&self, session: &OAuthSession) -> Result<(), TokenStoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO mcp_oauth_sessions
                (state, server_id, code_verifier, client_id, client_secret, redirect_uri,
                 token_endpoint, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.state)
        .bind(&session.server_id)
        .bind(&session.code_verifier)
        .bind(&session.client_id)
        .bind(&session.client_secret)
        .bind(&session.redirect_uri)
        .bind(&session.token_endpoint)
        .bind(format_datetime(session.created_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn take_session(&self, state: &str) -> Result<Option<OAuthSession>, TokenStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT state, server_id, code_verifier, client_id, client_secret, redirect_uri, \
             token_endpoint, created_at FROM mcp_oauth_sessions WHERE state = ?",
        )
        .bind(state)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if row.is_some() {
            sqlx::query("DELETE FROM mcp_oauth_sessions WHERE state = ?")
                .bind(state)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.map(OAuthSession::from))
    }
}
