//! Streamable HTTP transport.
//!
//! Every JSON-RPC message is a POST to the server endpoint. The server
//! answers with either a JSON body or an SSE stream that eventually carries
//! the response. The `Mcp-Session-Id` header returned by `initialize` is
//! echoed on every later request, and the stored OAuth token (if any) is
//! read fresh for each request so newly stored tokens apply immediately.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolhub_core::{McpServer, McpTool, McpToolResult, OAuthTokenStore};

use super::{McpTransport, TransportError};
use crate::jsonrpc::{self, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, RpcChannel};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_HEADER: &str = "MCP-Protocol-Version";

#[derive(Debug, Default)]
struct HttpSession {
    session_id: Option<String>,
    protocol_version: Option<String>,
}

/// Transport for remote MCP servers speaking streamable HTTP.
pub struct HttpTransport {
    server_id: String,
    server_name: String,
    url: Option<String>,
    headers: BTreeMap<String, String>,
    http: reqwest::Client,
    tokens: Arc<dyn OAuthTokenStore>,
    request_timeout: Duration,
    next_id: AtomicU64,
    session: Mutex<HttpSession>,
}

impl HttpTransport {
    pub fn new(
        server: &McpServer,
        http: reqwest::Client,
        tokens: Arc<dyn OAuthTokenStore>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server_id: server.id.clone(),
            server_name: server.name.clone(),
            url: server.config.url.clone(),
            headers: server.config.headers.clone(),
            http,
            tokens,
            request_timeout,
            next_id: AtomicU64::new(1),
            session: Mutex::new(HttpSession::default()),
        }
    }

    fn endpoint(&self) -> Result<url::Url, TransportError> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| TransportError::Http("HTTP server requires url".to_string()))?;
        url::Url::parse(raw).map_err(|e| TransportError::Http(format!("Invalid URL '{raw}': {e}")))
    }

    fn session(&self) -> std::sync::MutexGuard<'_, HttpSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn post<T: Serialize + Sync>(&self, body: &T) -> Result<reqwest::Response, TransportError> {
        let mut request = self
            .http
            .post(self.endpoint()?)
            .header(ACCEPT, "application/json, text/event-stream")
            .timeout(self.request_timeout)
            .json(body);

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let (session_id, protocol_version) = {
            let session = self.session();
            (session.session_id.clone(), session.protocol_version.clone())
        };
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }
        if let Some(version) = protocol_version {
            request = request.header(PROTOCOL_HEADER, version);
        }

        let tokens = self
            .tokens
            .get_tokens(&self.server_id)
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if let Some(tokens) = tokens {
            request = request.header(AUTHORIZATION, tokens.authorization_header());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let www_authenticate = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            return Err(TransportError::Unauthorized { www_authenticate });
        }

        if status == StatusCode::NOT_FOUND && self.session().session_id.is_some() {
            // The server dropped our session
            *self.session() = HttpSession::default();
            return Err(TransportError::Closed);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session().session_id = Some(id.to_string());
        }

        Ok(response)
    }

    async fn exchange(&self, id: u64, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if is_sse {
            return read_sse_response(response, id).await;
        }

        let message: JsonRpcMessage = response.json().await?;
        message.into_result()
    }
}

/// Read SSE events until the one carrying the response to `id`.
async fn read_sse_response(response: reqwest::Response, id: u64) -> Result<Value, TransportError> {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for data in decoder.feed(&chunk) {
            match serde_json::from_str::<JsonRpcMessage>(&data) {
                Ok(message) if message.response_id() == Some(id) => return message.into_result(),
                Ok(message) => {
                    tracing::trace!(method = ?message.method, "Skipping unrelated SSE message");
                }
                Err(e) => tracing::debug!(error = %e, "Skipping malformed SSE data"),
            }
        }
    }

    Err(TransportError::Protocol(
        "SSE stream ended without a response".to_string(),
    ))
}

/// Incremental decoder for the `data:` payloads of an SSE byte stream.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes and return the data of every event completed by them.
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }

        events
    }
}

#[async_trait]
impl RpcChannel for HttpTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let Some(token) = cancel else {
            return self.exchange(id, method, params).await;
        };

        tokio::select! {
            result = self.exchange(id, method, params) => result,
            () = token.cancelled() => {
                if let Err(e) = self
                    .notify("notifications/cancelled", Some(jsonrpc::cancelled_params(id)))
                    .await
                {
                    tracing::debug!(server_name = %self.server_name, error = %e, "Failed to send cancellation");
                }
                Err(TransportError::Cancelled)
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        self.post(&JsonRpcNotification::new(method, params))
            .await
            .map(drop)
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        *self.session() = HttpSession::default();
        self.endpoint()?;

        let result = jsonrpc::initialize(self).await?;
        self.session().protocol_version = Some(result.protocol_version);

        tracing::debug!(
            server_name = %self.server_name,
            session = ?self.session().session_id,
            "Connected to HTTP MCP server"
        );
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, TransportError> {
        jsonrpc::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<McpToolResult, TransportError> {
        jsonrpc::call_tool(self, name, arguments, cancel).await
    }

    async fn close(&self) {
        let session_id = std::mem::take(&mut *self.session()).session_id;
        let (Some(session_id), Ok(url)) = (session_id, self.endpoint()) else {
            return;
        };

        let result = self
            .http
            .delete(url)
            .header(SESSION_HEADER, session_id)
            .timeout(self.request_timeout)
            .send()
            .await;

        if let Err(e) = result {
            tracing::debug!(server_name = %self.server_name, error = %e, "Failed to terminate HTTP MCP session");
        }
    }
}
