//! MCP service error types.
//!
//! This module defines service-level errors for MCP operations.

use thiserror::Error;

use super::{McpRepositoryError, TokenStoreError};

/// Domain-specific errors for MCP service operations.
///
/// Configuration-layer failures (`Repository`, `TokenStore`, `InvalidConfig`,
/// `ConfigNotFound`) surface to the triggering caller as-is. Connection-layer
/// failures are confined to one client handle.
#[derive(Debug, Error)]
pub enum McpServiceError {
    /// No persisted configuration for the id.
    #[error("MCP server configuration not found: {0}")]
    ConfigNotFound(String),

    /// No persisted configuration for the name.
    #[error("MCP server not found by name: {0}")]
    ServerNotFound(String),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] McpRepositoryError),

    /// Token store operation failed.
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    /// Configuration validation error.
    #[error("Invalid MCP configuration: {0}")]
    InvalidConfig(String),

    /// Transport failed to establish a session.
    #[error("Failed to connect to MCP server: {0}")]
    Connection(String),

    /// The server needs an OAuth handshake first.
    #[error("MCP server {server_id} requires authorization: {url}")]
    AuthorizationRequired { server_id: String, url: String },

    /// The client handle is not in `connected` state.
    #[error("MCP server not connected: {0}")]
    NotConnected(String),

    /// The tool is not in the server's current toolset.
    #[error("Tool '{tool}' not found on MCP server {server_id}")]
    ToolNotFound { server_id: String, tool: String },

    /// Remote tool execution failed at the transport level.
    #[error("MCP tool call failed: {0}")]
    ToolCall(String),

    /// The caller cancelled the operation.
    #[error("MCP operation cancelled")]
    Cancelled,

    /// OAuth discovery, registration or token exchange failed.
    #[error("MCP authorization failed: {0}")]
    OAuth(String),

    /// Internal service error.
    #[error("Internal MCP error: {0}")]
    Internal(String),
}

/// User-safe error information for MCP events.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpErrorInfo {
    /// ID of the MCP server (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,

    /// Name of the MCP server.
    pub server_name: String,

    /// User-friendly error message.
    pub message: String,

    /// Error category for UI handling.
    pub category: McpErrorCategory,
}

/// Categories of MCP errors for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpErrorCategory {
    /// Connection lifecycle error.
    Connection,
    /// OAuth handshake pending or failed.
    Authorization,
    /// Tool invocation error.
    Tool,
    /// Configuration error.
    Configuration,
    /// Unknown/internal error.
    Unknown,
}

impl McpErrorInfo {
    /// Create error info for a connection error.
    pub fn connection(
        server_id: Option<String>,
        server_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            message: message.into(),
            category: McpErrorCategory::Connection,
        }
    }

    /// Create error info for a tool error.
    pub fn tool(
        server_id: Option<String>,
        server_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            message: message.into(),
            category: McpErrorCategory::Tool,
        }
    }

    /// Create error info from a service error.
    pub fn from_error(
        server_id: Option<String>,
        server_name: impl Into<String>,
        error: &McpServiceError,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            message: error.to_string(),
            category: error.into(),
        }
    }
}

impl From<&McpServiceError> for McpErrorCategory {
    fn from(error: &McpServiceError) -> Self {
        match error {
            McpServiceError::Repository(_)
            | McpServiceError::TokenStore(_)
            | McpServiceError::Internal(_) => Self::Unknown,
            McpServiceError::Connection(_) | McpServiceError::NotConnected(_) => Self::Connection,
            McpServiceError::AuthorizationRequired { .. } | McpServiceError::OAuth(_) => {
                Self::Authorization
            }
            McpServiceError::ToolNotFound { .. }
            | McpServiceError::ToolCall(_)
            | McpServiceError::Cancelled => Self::Tool,
            McpServiceError::InvalidConfig(_)
            | McpServiceError::ConfigNotFound(_)
            | McpServiceError::ServerNotFound(_) => Self::Configuration,
        }
    }
}
