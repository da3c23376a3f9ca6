//! MCP (Model Context Protocol) server domain types.
//!
//! These types represent MCP servers in the system, independent of any
//! infrastructure concerns (database, process management, network).
//!
//! # Design
//!
//! - `McpServer` - A persisted MCP server with ID, owner and visibility
//! - `NewMcpServer` - Write model for upserts (ID optional)
//! - `McpServerConfig` - Transport configuration (command/args or url/headers)
//! - `McpServerType` - Transport kind (stdio or streamable HTTP)
//! - `McpServerStatus` - Runtime status of a client handle
//! - `McpTool` / `McpToolResult` - Tool schema and call result, relayed verbatim
//! - `OAuthTokens` / `OAuthSession` - Authorization state for HTTP servers

mod oauth;
mod types;

pub use oauth::{OAuthSession, OAuthTokens};
pub use types::{
    McpEnvEntry, McpServer, McpServerConfig, McpServerStatus, McpServerType, McpTool,
    McpToolResult, NewMcpServer, Visibility,
};
