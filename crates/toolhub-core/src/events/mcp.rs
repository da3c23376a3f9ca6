//! MCP server lifecycle events.

use serde::{Deserialize, Serialize};

use super::AppEvent;
use crate::domain::mcp::McpServer;
use crate::ports::McpErrorInfo;

/// Summary of an MCP server for event payloads.
///
/// This is a lightweight representation for events — not the full `McpServer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSummary {
    /// ID of the MCP server.
    pub id: String,
    /// User-friendly name of the server.
    pub name: String,
    /// Server type (stdio or http).
    pub server_type: String,
}

impl McpServerSummary {
    /// Create a new MCP server summary.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        server_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_type: server_type.into(),
        }
    }
}

impl From<&McpServer> for McpServerSummary {
    fn from(server: &McpServer) -> Self {
        Self::new(&server.id, &server.name, server.server_type.as_str())
    }
}

impl AppEvent {
    /// Create an MCP server saved event.
    pub const fn mcp_server_saved(server: McpServerSummary) -> Self {
        Self::McpServerSaved { server }
    }

    /// Create an MCP server removed event.
    pub fn mcp_server_removed(server_id: impl Into<String>) -> Self {
        Self::McpServerRemoved {
            server_id: server_id.into(),
        }
    }

    /// Create an MCP client connected event.
    pub fn mcp_client_connected(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
        tool_count: usize,
    ) -> Self {
        Self::McpClientConnected {
            server_id: server_id.into(),
            server_name: server_name.into(),
            tool_count,
        }
    }

    /// Create an MCP client authorizing event.
    pub fn mcp_client_authorizing(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
        authorization_url: impl Into<String>,
    ) -> Self {
        Self::McpClientAuthorizing {
            server_id: server_id.into(),
            server_name: server_name.into(),
            authorization_url: authorization_url.into(),
        }
    }

    /// Create an MCP client disconnected event.
    pub fn mcp_client_disconnected(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self::McpClientDisconnected {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Create an MCP server error event.
    pub const fn mcp_server_error(error: McpErrorInfo) -> Self {
        Self::McpServerError { error }
    }
}
