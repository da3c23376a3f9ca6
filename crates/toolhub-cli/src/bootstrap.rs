//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - Database pool and repositories (via toolhub-db)
//! - Transports and the OAuth flow (via toolhub-mcp)
//! - The MCP service facade
//!
//! Command handlers receive the composed [`CliContext`] and delegate to it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use toolhub_core::paths::database_path;
use toolhub_core::{AppEvent, AppEventEmitter};
use toolhub_db::{CoreFactory, Repos, setup_database};
use toolhub_mcp::{DefaultTransportFactory, HttpOAuthFlow, McpDeps, McpService};

use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Explicit database file; `None` resolves the default location.
    pub database_path: Option<PathBuf>,
    /// User the command acts for.
    pub user: String,
    /// OAuth redirect URI.
    pub redirect_uri: String,
    /// Per-request timeout for MCP servers.
    pub request_timeout: Duration,
}

impl CliConfig {
    /// Build config from parsed global options.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            database_path: cli.database.clone(),
            user: cli.user.clone(),
            redirect_uri: cli.redirect_uri.clone(),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
        }
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// MCP service for managing servers and calling tools.
    pub mcp: Arc<McpService>,
    /// Repositories backing the service.
    pub repos: Repos,
    /// The configuration the context was built from.
    pub config: CliConfig,
}

impl CliContext {
    pub const fn mcp(&self) -> &Arc<McpService> {
        &self.mcp
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }
}

/// Event sink for a terminal session: events go to the log.
#[derive(Debug, Default)]
pub struct LogEmitter;

impl AppEventEmitter for LogEmitter {
    fn emit(&self, event: AppEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::debug!(event = %json, "toolhub event"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
    }
}

/// Bootstrap the CLI application.
///
/// 1. Opens the database and builds the repositories
/// 2. Creates the transport factory and OAuth flow over the token store
/// 3. Assembles the MCP service
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => database_path()?,
    };
    let pool = setup_database(&db_path).await?;
    let repos = CoreFactory::build_repos(pool);

    let transports = DefaultTransportFactory::new(Arc::clone(&repos.oauth_tokens))
        .with_request_timeout(config.request_timeout);
    let oauth = HttpOAuthFlow::new(Arc::clone(&repos.oauth_tokens), config.redirect_uri.clone());

    let mcp = Arc::new(McpService::new(McpDeps {
        repository: Arc::clone(&repos.mcp_servers),
        tokens: Arc::clone(&repos.oauth_tokens),
        transports: Arc::new(transports),
        oauth: Arc::new(oauth),
        emitter: Arc::new(LogEmitter),
    }));

    tracing::debug!(database = %db_path.display(), user = %config.user, "CLI bootstrapped");

    Ok(CliContext { mcp, repos, config })
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolhub_core::{McpServerRepository, NewMcpServer};

    fn config_for(dir: &std::path::Path) -> CliConfig {
        CliConfig {
            database_path: Some(dir.join("nested").join("toolhub.db")),
            user: "alice".to_string(),
            redirect_uri: crate::parser::DEFAULT_REDIRECT_URI.to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = bootstrap(config_for(dir.path())).await.unwrap();

        assert!(dir.path().join("nested").join("toolhub.db").exists());
        assert!(ctx.mcp().get_clients().await.is_empty());
        assert_eq!(ctx.user(), "alice");
    }

    #[tokio::test]
    async fn test_bootstrap_persists_between_contexts() {
        let dir = tempfile::tempdir().unwrap();

        let first = bootstrap(config_for(dir.path())).await.unwrap();
        let saved = first
            .repos
            .mcp_servers
            .save(
                NewMcpServer::new_http("notes", "https://notes.example/mcp", "alice")
                    .with_enabled(false),
            )
            .await
            .unwrap();

        let second = bootstrap(config_for(dir.path())).await.unwrap();
        let found = second.repos.mcp_servers.find_by_id(&saved.id).await.unwrap();
        assert_eq!(found.map(|s| s.name), Some("notes".to_string()));
    }
}
