//! Manager facade: the entry point the rest of the application uses.
//!
//! Adds name lookup, user-aware listing, OAuth completion and config
//! validation on top of [`ClientRegistry`]. Permission checks belong to the
//! caller; the facade assumes they already happened.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolhub_core::{
    AppEvent, AppEventEmitter, McpErrorInfo, McpRepositoryError, McpServerRepository,
    McpServerStatus, McpServiceError, McpTool, McpToolResult, NewMcpServer, OAuthTokenStore,
};

use crate::client::{McpClient, McpClientInfo};
use crate::oauth::OAuthFlow;
use crate::registry::ClientRegistry;
use crate::transport::TransportFactory;

/// Dependencies for creating the MCP service.
///
/// This struct bundles all the ports needed to construct an [`McpService`].
#[derive(Clone)]
pub struct McpDeps {
    /// Persisted server configurations.
    pub repository: Arc<dyn McpServerRepository>,
    /// OAuth tokens and pending sessions.
    pub tokens: Arc<dyn OAuthTokenStore>,
    /// Builds the transport for a server.
    pub transports: Arc<dyn TransportFactory>,
    /// Starts and completes OAuth handshakes.
    pub oauth: Arc<dyn OAuthFlow>,
    /// Lifecycle event sink.
    pub emitter: Arc<dyn AppEventEmitter>,
}

/// MCP service providing unified access to MCP clients.
///
/// Constructed once per process; call [`Self::initialize`] at startup and
/// [`Self::shutdown`] before exit.
pub struct McpService {
    deps: McpDeps,
    registry: ClientRegistry,
}

impl McpService {
    /// Create a new MCP service with injected dependencies.
    pub fn new(deps: McpDeps) -> Self {
        Self {
            registry: ClientRegistry::new(deps.clone()),
            deps,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect every enabled server.
    ///
    /// Individual connection failures are kept in their handles; only a
    /// failure to list configurations is an error.
    pub async fn initialize(&self) -> Result<usize, McpServiceError> {
        self.registry.hydrate().await
    }

    /// Disconnect every client.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Snapshot of every known client.
    pub async fn get_clients(&self) -> Vec<McpClientInfo> {
        let clients = self.registry.get_clients().await;
        let mut infos = Vec::with_capacity(clients.len());
        for client in clients {
            infos.push(client.info().await);
        }
        infos
    }

    /// Clients `user_id` may see: public ones and their own.
    pub async fn get_clients_for_user(&self, user_id: &str) -> Vec<McpClientInfo> {
        let clients = self.registry.get_clients().await;
        let mut infos = Vec::new();
        for client in clients {
            if client.server().is_visible_to(user_id) {
                infos.push(client.info().await);
            }
        }
        infos
    }

    /// Existing or newly connected client; `None` when no config exists.
    pub async fn get_client(&self, id: &str) -> Result<Option<Arc<McpClient>>, McpServiceError> {
        self.registry.get_client(id).await
    }

    /// Validate and save a configuration, then rebuild its client.
    pub async fn persist_client(
        &self,
        config: NewMcpServer,
    ) -> Result<Arc<McpClient>, McpServiceError> {
        config.validate().map_err(McpServiceError::InvalidConfig)?;

        let client = self.registry.persist_client(config).await?;
        tracing::info!(
            server_id = %client.id(),
            server_name = %client.name(),
            "Saved MCP server configuration"
        );
        Ok(client)
    }

    /// Delete a configuration with its tokens and tear down its client.
    ///
    /// The client is torn down even when a delete fails; the first failure
    /// is reported afterwards.
    pub async fn remove_client(&self, id: &str) -> Result<(), McpServiceError> {
        let config = self.deps.repository.delete(id).await.map_err(|e| match e {
            McpRepositoryError::NotFound(id) => McpServiceError::ConfigNotFound(id),
            other => other.into(),
        });
        let tokens = self.deps.tokens.delete_tokens(id).await;
        self.registry.remove_client(id).await;

        config?;
        tokens?;

        self.deps.emitter.emit(AppEvent::mcp_server_removed(id));
        tracing::info!(server_id = %id, "Removed MCP server configuration");
        Ok(())
    }

    /// Replace the client for `id` with a freshly connected one.
    pub async fn refresh_client(&self, id: &str) -> Result<(), McpServiceError> {
        self.registry
            .refresh_client(id)
            .await?
            .map(drop)
            .ok_or_else(|| McpServiceError::ConfigNotFound(id.to_string()))
    }

    // =========================================================================
    // Tool Operations
    // =========================================================================

    /// Call a tool on the server with id `id`.
    pub async fn tool_call(
        &self,
        id: &str,
        tool: &str,
        input: Value,
    ) -> Result<McpToolResult, McpServiceError> {
        self.tool_call_with_cancel(id, tool, input, None).await
    }

    /// Call a tool, aborting when `cancel` fires.
    pub async fn tool_call_with_cancel(
        &self,
        id: &str,
        tool: &str,
        input: Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<McpToolResult, McpServiceError> {
        let client = self
            .registry
            .get_client(id)
            .await?
            .ok_or_else(|| McpServiceError::ConfigNotFound(id.to_string()))?;

        match client.call_tool(tool, input, cancel).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let err = McpServiceError::from(e);
                if matches!(err, McpServiceError::ToolCall(_)) {
                    self.deps
                        .emitter
                        .emit(AppEvent::mcp_server_error(McpErrorInfo::tool(
                            Some(client.id().to_string()),
                            client.name(),
                            err.to_string(),
                        )));
                }
                Err(err)
            }
        }
    }

    /// Call a tool on the server named `name`.
    pub async fn tool_call_by_server_name(
        &self,
        name: &str,
        tool: &str,
        input: Value,
    ) -> Result<McpToolResult, McpServiceError> {
        self.tool_call_by_server_name_with_cancel(name, tool, input, None)
            .await
    }

    /// Resolve `name` to its id, then behave like [`Self::tool_call_with_cancel`].
    pub async fn tool_call_by_server_name_with_cancel(
        &self,
        name: &str,
        tool: &str,
        input: Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<McpToolResult, McpServiceError> {
        let server = self
            .deps
            .repository
            .find_by_name(name)
            .await?
            .ok_or_else(|| McpServiceError::ServerNotFound(name.to_string()))?;

        self.tool_call_with_cancel(&server.id, tool, input, cancel)
            .await
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    /// Finish an OAuth redirect: exchange `code`, store tokens, reconnect.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<Arc<McpClient>, McpServiceError> {
        let session = self.deps.tokens.take_session(state).await?.ok_or_else(|| {
            McpServiceError::OAuth("unknown or expired authorization state".to_string())
        })?;

        let tokens = self.deps.oauth.exchange_code(&session, code).await?;
        self.deps
            .tokens
            .save_tokens(&session.server_id, &tokens)
            .await?;

        tracing::info!(server_id = %session.server_id, "Stored OAuth tokens");

        self.registry
            .refresh_client(&session.server_id)
            .await?
            .ok_or(McpServiceError::ConfigNotFound(session.server_id))
    }

    /// Tokens for `id` were stored elsewhere; resume an `authorizing` client.
    ///
    /// Returns `None` when no client exists for `id`.
    pub async fn notify_tokens_available(
        &self,
        id: &str,
    ) -> Result<Option<McpServerStatus>, McpServiceError> {
        self.registry.resume_authorization(id).await
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Connect a throwaway client, list its tools, disconnect.
    ///
    /// The registry is never touched.
    pub async fn test_connection(
        &self,
        config: NewMcpServer,
    ) -> Result<Vec<McpTool>, McpServiceError> {
        config.validate().map_err(McpServiceError::InvalidConfig)?;

        let server = config.into_unsaved(format!("test-{}", uuid::Uuid::new_v4()));
        let transport = self.deps.transports.create(&server);
        let client = McpClient::new(
            server,
            transport,
            Arc::clone(&self.deps.tokens),
            Arc::clone(&self.deps.oauth),
        );

        let status = client.connect().await;
        let tools = client.tools().await;
        let authorization_url = client.authorization_url().await;
        client.disconnect().await;

        match status {
            McpServerStatus::Connected => Ok(tools),
            McpServerStatus::Authorizing => Err(McpServiceError::AuthorizationRequired {
                server_id: client.id().to_string(),
                url: authorization_url.unwrap_or_default(),
            }),
            McpServerStatus::Error(message) => Err(McpServiceError::Connection(message)),
            other => Err(McpServiceError::Internal(format!(
                "unexpected status after connect: {}",
                other.label()
            ))),
        }
    }
}
