//! Client handle: one live (or attempting) connection to one MCP server.
//!
//! Status moves `connecting -> connected | authorizing | error`. `error` is
//! terminal for the instance; the registry replaces the handle to retry.
//! `authorizing` can move to `connected` in place once tokens are stored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use toolhub_core::{
    McpServer, McpServerStatus, McpServerType, McpServiceError, McpTool, McpToolResult,
    OAuthTokenStore, TokenStoreError, Visibility,
};

use crate::oauth::OAuthFlow;
use crate::transport::{McpTransport, TransportError};

/// Errors from a single client handle.
#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("MCP server not connected: {0}")]
    NotConnected(String),

    #[error("Tool '{tool}' not found on MCP server {server_id}")]
    ToolNotFound { server_id: String, tool: String },

    #[error("MCP tool call failed: {0}")]
    ToolCall(#[source] TransportError),

    #[error("MCP tool call cancelled")]
    Cancelled,

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl From<McpClientError> for McpServiceError {
    fn from(e: McpClientError) -> Self {
        match e {
            McpClientError::NotConnected(id) => Self::NotConnected(id),
            McpClientError::ToolNotFound { server_id, tool } => {
                Self::ToolNotFound { server_id, tool }
            }
            McpClientError::ToolCall(e) => Self::ToolCall(e.to_string()),
            McpClientError::Cancelled => Self::Cancelled,
            McpClientError::TokenStore(e) => Self::TokenStore(e),
        }
    }
}

/// Side-effect-free snapshot of a handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpClientInfo {
    pub id: String,
    pub name: String,
    pub server_type: McpServerType,
    pub status: McpServerStatus,
    pub tools: Vec<McpTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    pub visibility: Visibility,
    pub owner_user_id: String,
}

/// What [`McpClient::resume_authorization`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// Not `authorizing`, or no tokens yet.
    Unchanged(McpServerStatus),
    /// Reconnected with the stored tokens.
    Reconnected(McpServerStatus),
}

impl Resume {
    pub const fn status(&self) -> &McpServerStatus {
        match self {
            Self::Unchanged(status) | Self::Reconnected(status) => status,
        }
    }
}

#[derive(Debug, Default)]
struct ClientState {
    status: McpServerStatus,
    tools: Vec<McpTool>,
    authorization_url: Option<String>,
}

/// Handle to one MCP server.
///
/// Created only by the registry (and by throwaway connection tests).
pub struct McpClient {
    server: McpServer,
    transport: Arc<dyn McpTransport>,
    tokens: Arc<dyn OAuthTokenStore>,
    oauth: Arc<dyn OAuthFlow>,
    state: RwLock<ClientState>,
    /// Held across connect, resume and disconnect so they never interleave.
    lifecycle: Mutex<()>,
}

impl McpClient {
    /// Create a handle in `connecting` state. Call [`Self::connect`] next.
    pub fn new(
        server: McpServer,
        transport: Arc<dyn McpTransport>,
        tokens: Arc<dyn OAuthTokenStore>,
        oauth: Arc<dyn OAuthFlow>,
    ) -> Self {
        Self {
            server,
            transport,
            tokens,
            oauth,
            state: RwLock::new(ClientState {
                status: McpServerStatus::Connecting,
                ..ClientState::default()
            }),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.server.id
    }

    pub fn name(&self) -> &str {
        &self.server.name
    }

    /// Configuration snapshot this handle was built from.
    pub const fn server(&self) -> &McpServer {
        &self.server
    }

    /// Open the transport and list tools. Returns the resulting status.
    ///
    /// Never fails: failures are recorded in the status.
    pub async fn connect(&self) -> McpServerStatus {
        let _lifecycle = self.lifecycle.lock().await;
        self.connect_locked().await
    }

    async fn connect_locked(&self) -> McpServerStatus {
        {
            let mut state = self.state.write().await;
            state.status = McpServerStatus::Connecting;
            state.authorization_url = None;
        }

        let outcome = match self.transport.connect().await {
            Ok(()) => self.transport.list_tools().await,
            Err(e) => Err(e),
        };

        let next = match outcome {
            Ok(tools) => {
                tracing::info!(
                    server_id = %self.server.id,
                    server_name = %self.server.name,
                    tool_count = tools.len(),
                    "MCP client connected"
                );
                ClientState {
                    status: McpServerStatus::Connected,
                    tools,
                    authorization_url: None,
                }
            }
            Err(TransportError::Unauthorized { www_authenticate }) => {
                self.transport.close().await;
                self.begin_authorization(www_authenticate.as_deref()).await
            }
            Err(e) => {
                self.transport.close().await;
                tracing::warn!(
                    server_id = %self.server.id,
                    server_name = %self.server.name,
                    error = %e,
                    "MCP client connection failed"
                );
                ClientState {
                    status: McpServerStatus::Error(e.to_string()),
                    ..ClientState::default()
                }
            }
        };

        let status = next.status.clone();
        *self.state.write().await = next;
        status
    }

    async fn begin_authorization(&self, www_authenticate: Option<&str>) -> ClientState {
        match self
            .oauth
            .begin_authorization(&self.server, www_authenticate)
            .await
        {
            Ok(url) => {
                tracing::info!(
                    server_id = %self.server.id,
                    server_name = %self.server.name,
                    "MCP server requires authorization"
                );
                ClientState {
                    status: McpServerStatus::Authorizing,
                    tools: Vec::new(),
                    authorization_url: Some(url),
                }
            }
            Err(e) => {
                tracing::warn!(
                    server_id = %self.server.id,
                    server_name = %self.server.name,
                    error = %e,
                    "Failed to start MCP authorization"
                );
                ClientState {
                    status: McpServerStatus::Error(e.to_string()),
                    ..ClientState::default()
                }
            }
        }
    }

    pub async fn status(&self) -> McpServerStatus {
        self.state.read().await.status.clone()
    }

    /// Disconnected handles are replaced on next access.
    pub async fn is_stale(&self) -> bool {
        matches!(self.state.read().await.status, McpServerStatus::Disconnected)
    }

    pub async fn tools(&self) -> Vec<McpTool> {
        self.state.read().await.tools.clone()
    }

    pub async fn info(&self) -> McpClientInfo {
        let state = self.state.read().await;
        McpClientInfo {
            id: self.server.id.clone(),
            name: self.server.name.clone(),
            server_type: self.server.server_type,
            status: state.status.clone(),
            tools: state.tools.clone(),
            authorization_url: state.authorization_url.clone(),
            visibility: self.server.visibility,
            owner_user_id: self.server.owner_user_id.clone(),
        }
    }

    /// The redirect target, only while `authorizing`.
    pub async fn authorization_url(&self) -> Option<String> {
        let state = self.state.read().await;
        match state.status {
            McpServerStatus::Authorizing => state.authorization_url.clone(),
            _ => None,
        }
    }

    /// Call a tool.
    ///
    /// Fails with `NotConnected` before touching the network unless the
    /// handle is `connected`. No retry.
    pub async fn call_tool(
        &self,
        tool: &str,
        input: Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<McpToolResult, McpClientError> {
        {
            let state = self.state.read().await;
            if !state.status.is_connected() {
                return Err(McpClientError::NotConnected(self.server.id.clone()));
            }
            if !state.tools.iter().any(|t| t.name == tool) {
                return Err(McpClientError::ToolNotFound {
                    server_id: self.server.id.clone(),
                    tool: tool.to_string(),
                });
            }
        }

        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        tracing::debug!(server_id = %self.server.id, tool = %tool, "Calling MCP tool");

        match self.transport.call_tool(tool, input, cancel).await {
            Ok(result) => Ok(result),
            Err(TransportError::Cancelled) => Err(McpClientError::Cancelled),
            Err(e) => {
                tracing::warn!(server_id = %self.server.id, tool = %tool, error = %e, "MCP tool call failed");
                Err(McpClientError::ToolCall(e))
            }
        }
    }

    /// Retry an `authorizing` handle in place when tokens are now stored.
    ///
    /// Other states are returned unchanged. Concurrent resumes connect once;
    /// a handle disconnected meanwhile stays disconnected.
    pub async fn resume_authorization(&self) -> Result<Resume, McpClientError> {
        let _lifecycle = self.lifecycle.lock().await;
        let status = self.status().await;
        if status != McpServerStatus::Authorizing {
            return Ok(Resume::Unchanged(status));
        }

        if self.tokens.get_tokens(&self.server.id).await?.is_none() {
            tracing::debug!(server_id = %self.server.id, "No tokens yet, still authorizing");
            return Ok(Resume::Unchanged(status));
        }

        Ok(Resume::Reconnected(self.connect_locked().await))
    }

    /// Close the transport. The handle becomes stale.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.transport.close().await;

        let mut state = self.state.write().await;
        state.status = McpServerStatus::Disconnected;
        state.authorization_url = None;
        drop(state);

        tracing::debug!(server_id = %self.server.id, server_name = %self.server.name, "MCP client disconnected");
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("id", &self.server.id)
            .field("name", &self.server.name)
            .finish_non_exhaustive()
    }
}
