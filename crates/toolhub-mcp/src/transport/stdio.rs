//! Stdio transport: newline-delimited JSON-RPC over a child process.
//!
//! A reader task owns the child's stdout and routes each response to the
//! waiting request through a oneshot channel, so requests may overlap.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use toolhub_core::{McpEnvEntry, McpServer, McpTool, McpToolResult};

use super::{McpTransport, TransportError};
use crate::jsonrpc::{self, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, RpcChannel};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcMessage>>>>;

/// One running child process.
struct Session {
    child: Child,
    stdin: ChildStdin,
    pending: PendingMap,
    reader: JoinHandle<()>,
    stderr: Option<JoinHandle<()>>,
}

/// Transport that spawns and owns an MCP server process.
pub struct StdioTransport {
    server_name: String,
    command: Option<String>,
    args: Vec<String>,
    working_dir: Option<String>,
    path_extra: Option<String>,
    env: Vec<McpEnvEntry>,
    request_timeout: Duration,
    next_id: AtomicU64,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl StdioTransport {
    /// Snapshot the stdio configuration of `server`.
    pub fn new(server: &McpServer, request_timeout: Duration) -> Self {
        Self {
            server_name: server.name.clone(),
            command: server.config.command.clone(),
            args: server.config.args().to_vec(),
            working_dir: server
                .config
                .working_dir
                .clone()
                .filter(|dir| !dir.is_empty()),
            path_extra: server.config.path_extra.clone(),
            env: server.env.clone(),
            request_timeout,
            next_id: AtomicU64::new(1),
            session: tokio::sync::Mutex::new(None),
        }
    }

    fn spawn_process(&self) -> Result<Session, TransportError> {
        let command = self
            .command
            .as_deref()
            .ok_or_else(|| TransportError::Spawn("Stdio server requires command".to_string()))?;

        crate::path::validate_command(command).map_err(TransportError::Spawn)?;
        if let Some(dir) = &self.working_dir {
            crate::path::validate_working_dir(dir).map_err(TransportError::Spawn)?;
        }

        let effective_path = crate::path::build_effective_path(command, self.path_extra.as_deref());

        let mut cmd = Command::new(command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PATH", &effective_path)
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        // User-provided variables win over the enriched PATH
        for entry in &self.env {
            cmd.env(&entry.key, &entry.value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            TransportError::Spawn(format!(
                "Failed to spawn '{command}': {e}\nArgs: {:?}\nCwd: {:?}\nEffective PATH: {}",
                self.args,
                self.working_dir,
                effective_path.to_string_lossy()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("Failed to get stdout".to_string()))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_responses(
            stdout,
            Arc::clone(&pending),
            self.server_name.clone(),
        ));

        let server_name = self.server_name.clone();
        let stderr = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server_name = %server_name, "[stderr] {line}");
                }
            })
        });

        Ok(Session {
            child,
            stdin,
            pending,
            reader,
            stderr,
        })
    }

    /// Register a pending request and write it, under the session lock.
    async fn send_request(
        &self,
        id: u64,
        line: &str,
    ) -> Result<(oneshot::Receiver<JsonRpcMessage>, PendingMap), TransportError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::Closed)?;

        let (tx, rx) = oneshot::channel();
        lock(&session.pending).insert(id, tx);

        if let Err(e) = write_line(&mut session.stdin, line).await {
            lock(&session.pending).remove(&id);
            return Err(e);
        }

        Ok((rx, Arc::clone(&session.pending)))
    }

    async fn send_cancelled(&self, id: u64) {
        if let Err(e) = self
            .notify("notifications/cancelled", Some(jsonrpc::cancelled_params(id)))
            .await
        {
            tracing::debug!(server_name = %self.server_name, error = %e, "Failed to send cancellation");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<(), TransportError> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

/// Route stdout lines to pending requests until the process closes stdout.
async fn read_responses(stdout: ChildStdout, pending: PendingMap, server_name: String) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let Ok(message) = serde_json::from_str::<JsonRpcMessage>(trimmed) else {
                    // npx and friends print banners on stdout
                    tracing::debug!(server_name = %server_name, line = trimmed, "Skipping non-JSON-RPC output");
                    continue;
                };

                if let Some(id) = message.response_id() {
                    if let Some(tx) = lock(&pending).remove(&id) {
                        let _ = tx.send(message);
                    }
                } else if let Some(method) = &message.method {
                    tracing::debug!(server_name = %server_name, method = %method, "Ignoring server-initiated message");
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(server_name = %server_name, error = %e, "Failed to read MCP server output");
                break;
            }
        }
    }

    tracing::debug!(server_name = %server_name, "MCP server closed stdout");
    // Dropping the senders fails every outstanding request with `Closed`
    lock(&pending).clear();
}

#[async_trait]
impl RpcChannel for StdioTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (rx, pending) = self.send_request(id, &line).await?;

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            response = tokio::time::timeout(self.request_timeout, rx) => match response {
                Ok(Ok(message)) => message.into_result(),
                Ok(Err(_)) => Err(TransportError::Closed),
                Err(_) => {
                    lock(&pending).remove(&id);
                    self.send_cancelled(id).await;
                    Err(TransportError::Timeout)
                }
            },
            () = cancelled => {
                lock(&pending).remove(&id);
                self.send_cancelled(id).await;
                Err(TransportError::Cancelled)
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::Closed)?;
        write_line(&mut session.stdin, &line).await
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.close().await;

        let session = self.spawn_process()?;
        *self.session.lock().await = Some(session);

        if let Err(e) = jsonrpc::initialize(self).await {
            self.close().await;
            return Err(e);
        }

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
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };

        session.reader.abort();
        if let Some(stderr) = session.stderr.take() {
            stderr.abort();
        }
        lock(&session.pending).clear();
        drop(session.stdin);

        if let Err(e) = session.child.kill().await {
            tracing::debug!(server_name = %self.server_name, error = %e, "MCP server process already gone");
        }

        tracing::debug!(server_name = %self.server_name, "MCP server process stopped");
    }
}
