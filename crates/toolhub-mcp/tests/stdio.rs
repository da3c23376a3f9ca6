//! Stdio transport against a scripted `/bin/sh` MCP server.

#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use toolhub_core::NewMcpServer;
use toolhub_mcp::{McpTransport, StdioTransport, TransportError};

const SERVER_SCRIPT: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":\([0-9]*\),.*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      echo "starting up"
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2025-03-26","serverInfo":{"name":"script","version":"1"},"capabilities":{"tools":{}}}}\n' "$id" ;;
    *'notifications/cancelled'*)
      printf '%s\n' "$line" >> "$CANCEL_LOG" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"greet","description":"Say hello","inputSchema":{"type":"object"}},{"name":"hang"}]}}\n' "$id" ;;
    *'"name":"hang"'*)
      ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"hello %s"}]}}\n' "$id" "$GREETING" ;;
  esac
done
"#;

fn scripted_server(dir: &Path) -> StdioTransport {
    let script = dir.join("server.sh");
    std::fs::write(&script, SERVER_SCRIPT).unwrap();

    let server = NewMcpServer::new_stdio(
        "script",
        "/bin/sh",
        vec![script.to_string_lossy().into_owned()],
        "alice",
    )
    .with_env("GREETING", "from env")
    .with_env(
        "CANCEL_LOG",
        dir.join("cancelled.log").to_string_lossy().into_owned(),
    )
    .into_unsaved("s1");

    StdioTransport::new(&server, Duration::from_millis(500))
}

#[tokio::test]
async fn handshake_lists_tools_and_calls() {
    let dir = tempfile::tempdir().unwrap();
    let transport = scripted_server(dir.path());

    transport.connect().await.unwrap();

    let tools = transport.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["greet", "hang"]);
    assert_eq!(tools[0].description.as_deref(), Some("Say hello"));

    let result = transport
        .call_tool("greet", json!({}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.text(), "hello from env");
    assert!(!result.is_error);

    transport.close().await;
}

#[tokio::test]
async fn unanswered_request_times_out_and_is_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let transport = scripted_server(dir.path());
    transport.connect().await.unwrap();

    let err = transport
        .call_tool("hang", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout));

    // The session survives a timed out request.
    let result = transport
        .call_tool("greet", json!({}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.text(), "hello from env");

    let log = std::fs::read_to_string(dir.path().join("cancelled.log")).unwrap();
    assert!(log.contains("\"requestId\""));

    transport.close().await;
}

#[tokio::test]
async fn cancellation_notifies_server() {
    let dir = tempfile::tempdir().unwrap();
    let transport = scripted_server(dir.path());
    transport.connect().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = transport
        .call_tool("hang", json!({}), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Cancelled));

    // Round trip so the server has processed the notification.
    transport
        .call_tool("greet", json!({}), &CancellationToken::new())
        .await
        .unwrap();
    let log = std::fs::read_to_string(dir.path().join("cancelled.log")).unwrap();
    assert!(log.contains("Cancelled by client"));

    transport.close().await;
}

#[tokio::test]
async fn closed_transport_rejects_calls_and_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    let transport = scripted_server(dir.path());

    transport.connect().await.unwrap();
    transport.close().await;

    let err = transport.list_tools().await.unwrap_err();
    assert!(matches!(err, TransportError::Closed));

    transport.connect().await.unwrap();
    assert_eq!(transport.list_tools().await.unwrap().len(), 2);
    transport.close().await;
}
