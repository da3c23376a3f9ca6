//! Domain types, independent of any infrastructure concern.

pub mod mcp;

pub use mcp::{
    McpEnvEntry, McpServer, McpServerConfig, McpServerStatus, McpServerType, McpTool,
    McpToolResult, NewMcpServer, OAuthSession, OAuthTokens, Visibility,
};
