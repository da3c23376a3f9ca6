//! JSON-RPC 2.0 framing and the MCP session handshake.
//!
//! Both transports speak the same messages; they differ only in how a
//! request reaches the server. [`RpcChannel`] is that difference, and the
//! free functions here run the protocol on top of any channel.
//!
//! Reference: <https://modelcontextprotocol.io/specification>

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use toolhub_core::{McpTool, McpToolResult};

use crate::transport::TransportError;

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Upper bound on `tools/list` pages, guards against a server that never
/// stops returning a cursor.
const MAX_TOOL_PAGES: usize = 64;

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Any inbound message: response, server request or server notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    /// Numeric id of a response to one of our requests.
    ///
    /// Server-initiated requests also carry an id, so the method must be absent.
    pub fn response_id(&self) -> Option<u64> {
        if self.method.is_some() {
            return None;
        }
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Unwrap the result, converting a JSON-RPC error object.
    pub fn into_result(self) -> Result<Value, TransportError> {
        if let Some(err) = self.error {
            return Err(TransportError::Server {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| TransportError::Protocol("Missing result in response".to_string()))
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// MCP initialize result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
}

/// Server information from initialize.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Server capabilities. Only `tools` matters to this crate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<Value>,
}

/// MCP tool from tools/list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolSchema {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<ToolSchema>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    structured_content: Option<Value>,
    #[serde(default)]
    is_error: bool,
}

/// A request/response channel to one MCP server.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send a request and wait for its response.
    ///
    /// When `cancel` fires first, the channel sends `notifications/cancelled`
    /// for the request and returns [`TransportError::Cancelled`].
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, TransportError>;

    /// Send a notification.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError>;
}

/// Run the `initialize` / `notifications/initialized` handshake.
pub async fn initialize<C: RpcChannel + ?Sized>(
    channel: &C,
) -> Result<InitializeResult, TransportError> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": "toolhub",
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    });

    let value = channel.request("initialize", Some(params), None).await?;
    let result: InitializeResult = serde_json::from_value(value)?;

    channel.notify("notifications/initialized", None).await?;

    tracing::debug!(
        server = %result.server_info.name,
        protocol_version = %result.protocol_version,
        "MCP session initialized"
    );

    Ok(result)
}

/// Fetch every page of `tools/list`.
pub async fn list_tools<C: RpcChannel + ?Sized>(
    channel: &C,
) -> Result<Vec<McpTool>, TransportError> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_TOOL_PAGES {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let value = channel.request("tools/list", params, None).await?;
        let page: ToolsPage = serde_json::from_value(value)?;

        tools.extend(page.tools.into_iter().map(|t| McpTool {
            name: t.name,
            description: t.description,
            input_schema: t.input_schema,
        }));

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(tools),
        }
    }

    Err(TransportError::Protocol(format!(
        "tools/list did not finish after {MAX_TOOL_PAGES} pages"
    )))
}

/// Invoke `tools/call` and relay the result unchanged.
pub async fn call_tool<C: RpcChannel + ?Sized>(
    channel: &C,
    name: &str,
    arguments: Value,
    cancel: &CancellationToken,
) -> Result<McpToolResult, TransportError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    let params = json!({ "name": name, "arguments": arguments });

    let value = channel.request("tools/call", Some(params), Some(cancel)).await?;
    let result: CallToolResult = serde_json::from_value(value)?;

    Ok(McpToolResult {
        content: result.content.unwrap_or_else(|| json!([])),
        structured_content: result.structured_content,
        is_error: result.is_error,
    })
}

/// Params for `notifications/cancelled`.
pub fn cancelled_params(request_id: u64) -> Value {
    json!({ "requestId": request_id, "reason": "Cancelled by client" })
}
