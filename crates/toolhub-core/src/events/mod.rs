//! Canonical event union for all adapters.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "mcp_client_connected", "serverId": "s1", "serverName": "weather", "toolCount": 2 }
//! ```

mod mcp;

use serde::{Deserialize, Serialize};

use crate::ports::McpErrorInfo;

pub use mcp::McpServerSummary;

/// Canonical event types for all adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// An MCP server configuration was created or replaced.
    McpServerSaved {
        /// Summary of the saved server.
        server: McpServerSummary,
    },

    /// An MCP server configuration was deleted.
    McpServerRemoved {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    /// A client handle finished connecting and listed its tools.
    McpClientConnected {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
        #[serde(rename = "toolCount")]
        tool_count: usize,
    },

    /// A client handle is waiting for the user to authorize.
    McpClientAuthorizing {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
        #[serde(rename = "authorizationUrl")]
        authorization_url: String,
    },

    /// A client handle was closed.
    McpClientDisconnected {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// An MCP server encountered an error.
    McpServerError {
        /// Error details.
        error: McpErrorInfo,
    },
}
