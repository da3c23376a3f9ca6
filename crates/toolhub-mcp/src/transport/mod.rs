//! Transports carrying MCP messages to a server.
//!
//! A [`McpTransport`] is selected by [`TransportFactory`] from the server's
//! `server_type`; the client handle never knows which variant it holds.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use toolhub_core::{McpServer, McpServerType, McpTool, McpToolResult, OAuthTokenStore};

/// Default per-request timeout applied by transports.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised while talking to an MCP server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to spawn MCP server process: {0}")]
    Spawn(String),

    #[error("Failed to communicate with MCP server: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Timeout waiting for MCP server response")]
    Timeout,

    #[error("MCP server returned error: code={code}, message={message}")]
    Server { code: i64, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    /// HTTP 401; the server expects an OAuth bearer token.
    #[error("MCP server requires authorization")]
    Unauthorized { www_authenticate: Option<String> },

    #[error("MCP server connection closed")]
    Closed,

    #[error("Request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Capability interface over one connection to one MCP server.
///
/// `connect` may be called again after `close` (or after a failed attempt)
/// to start a fresh session.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Open the connection and run the initialize handshake.
    async fn connect(&self) -> Result<(), TransportError>;

    /// List every tool the server advertises.
    async fn list_tools(&self) -> Result<Vec<McpTool>, TransportError>;

    /// Invoke a tool. Firing `cancel` aborts the wait and tells the server.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<McpToolResult, TransportError>;

    /// Close the connection. Never fails; errors are logged.
    async fn close(&self);
}

/// Builds the transport variant matching a server configuration.
pub trait TransportFactory: Send + Sync {
    fn create(&self, server: &McpServer) -> Arc<dyn McpTransport>;
}

/// Production factory: stdio child processes and streamable HTTP.
pub struct DefaultTransportFactory {
    tokens: Arc<dyn OAuthTokenStore>,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl DefaultTransportFactory {
    pub fn new(tokens: Arc<dyn OAuthTokenStore>) -> Self {
        Self {
            tokens,
            http: reqwest::Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, server: &McpServer) -> Arc<dyn McpTransport> {
        match server.server_type {
            McpServerType::Stdio => Arc::new(StdioTransport::new(server, self.request_timeout)),
            McpServerType::Http => Arc::new(HttpTransport::new(
                server,
                self.http.clone(),
                Arc::clone(&self.tokens),
                self.request_timeout,
            )),
        }
    }
}
