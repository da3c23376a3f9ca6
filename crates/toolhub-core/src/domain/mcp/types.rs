//! MCP server domain types.
//!
//! These types are shared between the registry, the persistence adapter and
//! any outer surface that serializes them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport kind of an MCP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpServerType {
    /// Stdio-based server - toolhub spawns and owns the process
    #[default]
    Stdio,
    /// Streamable HTTP server - external process, toolhub connects over HTTP
    Http,
}

impl McpServerType {
    /// Stable string form used in storage and event payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for McpServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may see and use a server's tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owner sees the server
    #[default]
    Private,
    /// Every user of the application sees the server
    Public,
}

impl Visibility {
    /// Stable string form used in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

/// Runtime status of a client handle.
///
/// `Connecting` moves to exactly one of `Connected`, `Authorizing` or `Error`.
/// `Error` is terminal for a handle; recovery replaces the handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpServerStatus {
    /// Connection attempt in progress
    Connecting,
    /// Session initialized, tools listed
    Connected,
    /// Remote server requires an OAuth handshake that has not completed
    Authorizing,
    /// Connection attempt failed
    Error(String),
    /// Handle was closed (or never connected)
    #[default]
    Disconnected,
}

impl McpServerStatus {
    /// Whether tool calls may be forwarded.
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Short label without the error payload.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authorizing => "authorizing",
            Self::Error(_) => "error",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Environment variable entry for stdio servers.
///
/// Note: Values are stored as base64-encoded strings in the database.
/// This is encoding, NOT encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpEnvEntry {
    /// Environment variable key
    pub key: String,
    /// Environment variable value
    pub value: String,
}

impl McpEnvEntry {
    /// Create a new environment variable entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Transport configuration for an MCP server.
///
/// For stdio servers, `command` is required. For HTTP servers, `url` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    // --- Stdio server fields ---
    /// Command to execute (e.g., "npx" or "/usr/local/bin/uvx").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments to pass to the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Working directory for the process (must be absolute if specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Additional PATH entries to prepend to the child process PATH.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_extra: Option<String>,

    // --- HTTP server fields ---
    /// Endpoint URL (e.g., `https://mcp.example.com/mcp`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Extra request headers sent with every HTTP request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl McpServerConfig {
    /// Create a stdio server configuration.
    #[must_use]
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some(command.into()),
            args: Some(args),
            ..Self::default()
        }
    }

    /// Create an HTTP server configuration.
    #[must_use]
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Arguments as a slice (empty when unset).
    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or(&[])
    }

    /// Validate configuration based on server type.
    ///
    /// Returns an error if required fields are missing or invalid for the server type.
    pub fn validate(&self, server_type: McpServerType) -> Result<(), String> {
        match server_type {
            McpServerType::Stdio => {
                let command = self
                    .command
                    .as_ref()
                    .ok_or_else(|| "Stdio server requires command".to_string())?;

                if command.trim().is_empty() {
                    return Err("Stdio server command cannot be empty".to_string());
                }

                if command.contains(char::is_whitespace) {
                    return Err(
                        "Command must be an executable name/path only (e.g., 'npx'). \
                         Put flags and arguments in the 'args' field."
                            .to_string(),
                    );
                }

                if let Some(ref cwd) = self.working_dir {
                    if !cwd.is_empty() && !std::path::Path::new(cwd).is_absolute() {
                        return Err(format!("Stdio server working_dir must be absolute: {cwd}"));
                    }
                }

                Ok(())
            }
            McpServerType::Http => {
                let url = self
                    .url
                    .as_ref()
                    .ok_or_else(|| "HTTP server requires url".to_string())?;

                if url.trim().is_empty() {
                    return Err("HTTP server url cannot be empty".to_string());
                }

                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!("HTTP server url must use http or https: {url}"));
                }

                Ok(())
            }
        }
    }
}

/// An MCP server configuration that exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    /// Stable identifier; also keys the live client handle.
    pub id: String,

    /// User-friendly name, unique by application convention.
    pub name: String,

    /// Transport kind.
    pub server_type: McpServerType,

    /// Transport configuration.
    pub config: McpServerConfig,

    /// Environment variables for stdio server processes.
    #[serde(default)]
    pub env: Vec<McpEnvEntry>,

    /// Who may see this server.
    pub visibility: Visibility,

    /// User that created the server.
    pub owner_user_id: String,

    /// Disabled servers are not hydrated at startup.
    pub enabled: bool,

    /// When the server was added.
    pub created_at: DateTime<Utc>,

    /// When the configuration last changed.
    pub updated_at: DateTime<Utc>,

    /// Last successful connection time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl McpServer {
    /// Whether `user_id` may see and call this server.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.visibility == Visibility::Public || self.owner_user_id == user_id
    }

    /// Validate the transport configuration against the server type.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }
        self.config.validate(self.server_type)
    }
}

/// Write model for creating or replacing an MCP server configuration.
///
/// `id: None` always inserts. `id: Some(_)` replaces the stored server with
/// that id, or inserts under that id when none exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMcpServer {
    /// Target id for upserts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// User-friendly name.
    pub name: String,

    /// Transport kind.
    pub server_type: McpServerType,

    /// Transport configuration.
    pub config: McpServerConfig,

    /// Environment variables for stdio server processes.
    #[serde(default)]
    pub env: Vec<McpEnvEntry>,

    /// Who may see this server.
    #[serde(default)]
    pub visibility: Visibility,

    /// User that owns the server.
    pub owner_user_id: String,

    /// Whether the server is hydrated at startup.
    pub enabled: bool,
}

impl NewMcpServer {
    /// Create a new stdio-based MCP server.
    #[must_use]
    pub fn new_stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        owner_user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            server_type: McpServerType::Stdio,
            config: McpServerConfig::stdio(command, args),
            env: Vec::new(),
            visibility: Visibility::Private,
            owner_user_id: owner_user_id.into(),
            enabled: true,
        }
    }

    /// Create a new HTTP-based MCP server.
    #[must_use]
    pub fn new_http(
        name: impl Into<String>,
        url: impl Into<String>,
        owner_user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            server_type: McpServerType::Http,
            config: McpServerConfig::http(url),
            env: Vec::new(),
            visibility: Visibility::Private,
            owner_user_id: owner_user_id.into(),
            enabled: true,
        }
    }

    /// Target an existing (or explicit) id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(McpEnvEntry::new(key, value));
        self
    }

    /// Add an HTTP header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.working_dir = Some(dir.into());
        self
    }

    /// Set visibility.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set enabled status.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate name and transport configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }
        self.config.validate(self.server_type)
    }

    /// Materialize into a server that was never stored, under `id`.
    ///
    /// Any id already on the config is ignored. Used for throwaway
    /// connection tests.
    pub fn into_unsaved(self, id: impl Into<String>) -> McpServer {
        let now = Utc::now();
        McpServer {
            id: id.into(),
            name: self.name,
            server_type: self.server_type,
            config: self.config,
            env: self.env,
            visibility: self.visibility,
            owner_user_id: self.owner_user_id,
            enabled: self.enabled,
            created_at: now,
            updated_at: now,
            last_connected_at: None,
        }
    }
}

/// Tool definition advertised by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name (function name).
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for input parameters, passed through unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

impl McpTool {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// Result of a `tools/call` request, relayed as the server sent it.
///
/// `is_error` is the server's own verdict about the tool execution; a
/// transport failure never produces a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolResult {
    /// The `content` array (text, image, resource items).
    pub content: serde_json::Value,

    /// Optional `structuredContent` payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,

    /// Whether the server flagged the call as failed.
    #[serde(default)]
    pub is_error: bool,
}

impl McpToolResult {
    /// Create a successful result.
    #[must_use]
    pub const fn success(content: serde_json::Value) -> Self {
        Self {
            content,
            structured_content: None,
            is_error: false,
        }
    }

    /// Create a result carrying a single text item.
    pub fn text_content(text: impl Into<String>) -> Self {
        Self::success(serde_json::json!([{ "type": "text", "text": text.into() }]))
    }

    /// Create an error result with a single text item.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text_content(message)
        }
    }

    /// Concatenate all `text` items of `content`, newline separated.
    pub fn text(&self) -> String {
        self.content
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(serde_json::Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stdio_config_requires_command() {
        let config = McpServerConfig::default();
        assert!(config.validate(McpServerType::Stdio).is_err());

        let config = McpServerConfig::stdio("npx", vec!["-y".into()]);
        assert!(config.validate(McpServerType::Stdio).is_ok());
    }

    #[test]
    fn test_stdio_command_rejects_whitespace() {
        let config = McpServerConfig::stdio("npx -y server", vec![]);
        let err = config.validate(McpServerType::Stdio).unwrap_err();
        assert!(err.contains("args"));
    }

    #[test]
    fn test_stdio_working_dir_must_be_absolute() {
        let mut config = McpServerConfig::stdio("node", vec![]);
        config.working_dir = Some("relative/dir".into());
        assert!(config.validate(McpServerType::Stdio).is_err());
    }

    #[test]
    fn test_http_config_requires_http_url() {
        assert!(
            McpServerConfig::http("ftp://example.com")
                .validate(McpServerType::Http)
                .is_err()
        );
        assert!(
            McpServerConfig::http("https://example.com/mcp")
                .validate(McpServerType::Http)
                .is_ok()
        );
        assert!(
            McpServerConfig::default()
                .validate(McpServerType::Http)
                .is_err()
        );
    }

    #[test]
    fn test_visibility_rules() {
        let mut server = NewMcpServer::new_http("weather", "https://w.example/mcp", "alice")
            .into_unsaved("s1");
        assert!(server.is_visible_to("alice"));
        assert!(!server.is_visible_to("bob"));

        server.visibility = Visibility::Public;
        assert!(server.is_visible_to("bob"));
    }

    #[test]
    fn test_into_unsaved_uses_given_id() {
        let server = NewMcpServer::new_stdio("x", "cmd", vec![], "u")
            .with_id("fixed")
            .into_unsaved("generated");
        assert_eq!(server.id, "generated");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(McpServerStatus::Authorizing).unwrap();
        assert_eq!(json, json!("authorizing"));

        let json = serde_json::to_value(McpServerStatus::Error("boom".into())).unwrap();
        assert_eq!(json, json!({ "error": "boom" }));
    }

    #[test]
    fn test_tool_result_text_joins_text_items() {
        let result = McpToolResult::success(json!([
            { "type": "text", "text": "line one" },
            { "type": "image", "data": "...", "mimeType": "image/png" },
            { "type": "text", "text": "line two" }
        ]));
        assert_eq!(result.text(), "line one\nline two");
        assert!(!result.is_error);
    }

    #[test]
    fn test_tool_result_error() {
        let result = McpToolResult::error("no such city");
        assert!(result.is_error);
        assert_eq!(result.text(), "no such city");
    }
}
