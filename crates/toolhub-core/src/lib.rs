//! Core domain types and port definitions for toolhub.
//!
//! This crate has no infrastructure dependencies. Adapters (`toolhub-db`,
//! `toolhub-mcp`, `toolhub-cli`) depend on it; it depends on none of them.
//!
//! - [`domain`] - MCP server configuration, tools, tool results, OAuth tokens
//! - [`ports`] - repository, token store and event emitter traits plus errors
//! - [`events`] - lifecycle events broadcast through [`AppEventEmitter`]
//! - [`paths`] - data directory and database location

#![deny(unsafe_code)]

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    McpEnvEntry, McpServer, McpServerConfig, McpServerStatus, McpServerType, McpTool,
    McpToolResult, NewMcpServer, OAuthSession, OAuthTokens, Visibility,
};
pub use events::{AppEvent, McpServerSummary};
pub use paths::{PathError, data_root, database_path};
pub use ports::{
    AppEventEmitter, McpErrorCategory, McpErrorInfo, McpRepositoryError, McpServerRepository,
    McpServiceError, NoopEmitter, OAuthTokenStore, TokenStoreError,
};
