//! Composition utilities for wiring toolhub with `SQLite` backends.
//!
//! This module is focused purely on construction and contains no domain logic.

use sqlx::SqlitePool;
use std::sync::Arc;

use toolhub_core::ports::{McpServerRepository, OAuthTokenStore};

use crate::repositories::{SqliteMcpRepository, SqliteTokenStore};

/// Container for the port trait objects backed by one pool.
#[derive(Clone)]
pub struct Repos {
    /// MCP server configuration store.
    pub mcp_servers: Arc<dyn McpServerRepository>,
    /// OAuth tokens and pending sessions.
    pub oauth_tokens: Arc<dyn OAuthTokenStore>,
}

/// Factory for creating repository instances with `SQLite` backends.
pub struct CoreFactory;

impl CoreFactory {
    /// Build all `SQLite` repositories from a pool.
    ///
    /// This is the recommended way for adapters to obtain repositories.
    pub fn build_repos(pool: SqlitePool) -> Repos {
        Repos {
            mcp_servers: Self::mcp_repository(pool.clone()),
            oauth_tokens: Self::token_store(pool),
        }
    }

    /// Create an MCP server repository from a pool.
    pub fn mcp_repository(pool: SqlitePool) -> Arc<SqliteMcpRepository> {
        Arc::new(SqliteMcpRepository::new(pool))
    }

    /// Create an OAuth token store from a pool.
    pub fn token_store(pool: SqlitePool) -> Arc<SqliteTokenStore> {
        Arc::new(SqliteTokenStore::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup_test_database;

    #[tokio::test]
    async fn test_build_repos_share_pool() {
        let pool = setup_test_database().await.unwrap();
        let repos = CoreFactory::build_repos(pool);

        assert!(repos.mcp_servers.list().await.unwrap().is_empty());
        assert!(repos.oauth_tokens.get_tokens("none").await.unwrap().is_none());
    }
}
