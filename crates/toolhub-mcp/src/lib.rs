//! MCP client connection manager.
//!
//! Reconciles persisted MCP server configurations with live client
//! connections and routes tool calls to them.
//!
//! - [`McpService`] - facade used by the application
//! - [`ClientRegistry`] - single owner of client handles, single-flight creation
//! - [`McpClient`] - one connection, its status and toolset
//! - [`transport`] - stdio and streamable HTTP transports
//! - [`oauth`] - authorization-code flow with PKCE for HTTP servers

#![deny(unsafe_code)]

pub mod client;
pub mod jsonrpc;
pub mod oauth;
pub(crate) mod path;
pub mod registry;
pub mod service;
pub mod transport;

// Re-export domain types from core for convenience
pub use toolhub_core::{
    McpEnvEntry, McpServer, McpServerConfig, McpServerStatus, McpServerType, McpTool,
    McpToolResult, NewMcpServer,
};

// Re-export this crate's public types
pub use client::{McpClient, McpClientError, McpClientInfo, Resume};
pub use oauth::{HttpOAuthFlow, OAuthError, OAuthFlow};
pub use registry::ClientRegistry;
pub use service::{McpDeps, McpService};
pub use transport::{
    DEFAULT_REQUEST_TIMEOUT, DefaultTransportFactory, HttpTransport, McpTransport,
    StdioTransport, TransportError, TransportFactory,
};
