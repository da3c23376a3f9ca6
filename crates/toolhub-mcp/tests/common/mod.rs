//! Shared fakes for the registry and facade tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolhub_core::{
    AppEvent, AppEventEmitter, McpRepositoryError, McpServer, McpServerRepository, McpTool,
    McpToolResult, NewMcpServer, OAuthSession, OAuthTokenStore, OAuthTokens, TokenStoreError,
};
use toolhub_mcp::{
    ClientRegistry, McpDeps, McpService, McpTransport, OAuthError, OAuthFlow, TransportError,
    TransportFactory,
};

// ─────────────────────────────────────────────────────────────────────────────
// Repository
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory repository with the same upsert and conflict rules as `SQLite`.
#[derive(Default)]
pub struct MemoryRepo {
    servers: Mutex<Vec<McpServer>>,
    next_id: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub lookups: AtomicUsize,
}

impl MemoryRepo {
    pub fn ids(&self) -> Vec<String> {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    fn check_reads(&self) -> Result<(), McpRepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(McpRepositoryError::Internal("database is locked".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl McpServerRepository for MemoryRepo {
    async fn find_by_id(&self, id: &str) -> Result<Option<McpServer>, McpRepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let servers = self.servers.lock().unwrap();
        Ok(servers.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<McpServer>, McpRepositoryError> {
        self.check_reads()?;
        let servers = self.servers.lock().unwrap();
        Ok(servers.iter().find(|s| s.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<McpServer>, McpRepositoryError> {
        self.check_reads()?;
        let mut servers = self.servers.lock().unwrap().clone();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(servers)
    }

    async fn save(&self, server: NewMcpServer) -> Result<McpServer, McpRepositoryError> {
        let id = server.id.clone().unwrap_or_else(|| {
            format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        });

        let mut servers = self.servers.lock().unwrap();
        if servers.iter().any(|s| s.name == server.name && s.id != id) {
            return Err(McpRepositoryError::Conflict(server.name));
        }

        let mut saved = server.into_unsaved(id.clone());
        if let Some(existing) = servers.iter_mut().find(|s| s.id == id) {
            saved.created_at = existing.created_at;
            *existing = saved.clone();
        } else {
            servers.push(saved.clone());
        }
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> Result<(), McpRepositoryError> {
        let mut servers = self.servers.lock().unwrap();
        let len_before = servers.len();
        servers.retain(|s| s.id != id);
        if servers.len() < len_before {
            Ok(())
        } else {
            Err(McpRepositoryError::NotFound(id.to_string()))
        }
    }

    async fn update_last_connected(&self, id: &str) -> Result<(), McpRepositoryError> {
        let mut servers = self.servers.lock().unwrap();
        if let Some(s) = servers.iter_mut().find(|s| s.id == id) {
            s.last_connected_at = Some(Utc::now());
            Ok(())
        } else {
            Err(McpRepositoryError::NotFound(id.to_string()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, OAuthTokens>>,
    sessions: Mutex<HashMap<String, OAuthSession>>,
    pub fail_deletes: AtomicBool,
}

impl MemoryTokenStore {
    pub fn has_tokens(&self, server_id: &str) -> bool {
        self.tokens.lock().unwrap().contains_key(server_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl OAuthTokenStore for MemoryTokenStore {
    async fn get_tokens(&self, server_id: &str) -> Result<Option<OAuthTokens>, TokenStoreError> {
        Ok(self.tokens.lock().unwrap().get(server_id).cloned())
    }

    async fn save_tokens(
        &self,
        server_id: &str,
        tokens: &OAuthTokens,
    ) -> Result<(), TokenStoreError> {
        self.tokens
            .lock()
            .unwrap()
            .insert(server_id.to_string(), tokens.clone());
        Ok(())
    }

    async fn delete_tokens(&self, server_id: &str) -> Result<(), TokenStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(TokenStoreError::Internal("disk I/O error".to_string()));
        }
        self.tokens.lock().unwrap().remove(server_id);
        self.sessions
            .lock()
            .unwrap()
            .retain(|_, s| s.server_id != server_id);
        Ok(())
    }

    async fn save_session(&self, session: &OAuthSession) -> Result<(), TokenStoreError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.state.clone(), session.clone());
        Ok(())
    }

    async fn take_session(&self, state: &str) -> Result<Option<OAuthSession>, TokenStoreError> {
        Ok(self.sessions.lock().unwrap().remove(state))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// How the fake server for one id behaves on the next connection.
#[derive(Clone, Default)]
pub struct FakeBehavior {
    pub tools: Vec<McpTool>,
    pub requires_auth: bool,
    pub fail_connect: Option<String>,
    pub connect_delay: Option<Duration>,
}

impl FakeBehavior {
    pub fn with_tools(names: &[&str]) -> Self {
        Self {
            tools: names.iter().map(|n| McpTool::new(*n)).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }
}

/// Counters shared by the factory and every transport it built.
#[derive(Default)]
pub struct FakeStats {
    pub created: AtomicUsize,
    pub connects: AtomicUsize,
    pub calls: AtomicUsize,
    pub cancelled: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct FakeShared {
    behaviors: Mutex<HashMap<String, FakeBehavior>>,
    tokens: Arc<MemoryTokenStore>,
    stats: Arc<FakeStats>,
}

pub struct FakeTransportFactory {
    shared: Arc<FakeShared>,
    pub stats: Arc<FakeStats>,
}

impl FakeTransportFactory {
    pub fn new(tokens: Arc<MemoryTokenStore>) -> Self {
        let stats = Arc::new(FakeStats::default());
        Self {
            shared: Arc::new(FakeShared {
                behaviors: Mutex::new(HashMap::new()),
                tokens,
                stats: Arc::clone(&stats),
            }),
            stats,
        }
    }

    pub fn set(&self, server_id: &str, behavior: FakeBehavior) {
        self.shared
            .behaviors
            .lock()
            .unwrap()
            .insert(server_id.to_string(), behavior);
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self, server: &McpServer) -> Arc<dyn McpTransport> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(FakeTransport {
            server_id: server.id.clone(),
            server_name: server.name.clone(),
            shared: Arc::clone(&self.shared),
        })
    }
}

pub struct FakeTransport {
    server_id: String,
    server_name: String,
    shared: Arc<FakeShared>,
}

impl FakeTransport {
    /// Behavior keyed by id, else by name (throwaway handles get fresh ids).
    fn behavior(&self) -> FakeBehavior {
        let behaviors = self.shared.behaviors.lock().unwrap();
        behaviors
            .get(&self.server_id)
            .or_else(|| behaviors.get(&self.server_name))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.shared.stats.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior();

        if let Some(delay) = behavior.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = behavior.fail_connect {
            return Err(TransportError::Spawn(message));
        }
        if behavior.requires_auth
            && self
                .shared
                .tokens
                .get_tokens(&self.server_id)
                .await
                .unwrap()
                .is_none()
        {
            return Err(TransportError::Unauthorized {
                www_authenticate: Some("Bearer realm=\"fake\"".to_string()),
            });
        }
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, TransportError> {
        Ok(self.behavior().tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<McpToolResult, TransportError> {
        self.shared.stats.calls.fetch_add(1, Ordering::SeqCst);

        match name {
            "slow" => {
                tokio::select! {
                    () = cancel.cancelled() => {
                        self.shared.stats.cancelled.fetch_add(1, Ordering::SeqCst);
                        Err(TransportError::Cancelled)
                    }
                    () = tokio::time::sleep(Duration::from_secs(30)) => {
                        Ok(McpToolResult::text_content("finally"))
                    }
                }
            }
            "explode" => Err(TransportError::Server {
                code: -32603,
                message: "tool crashed".to_string(),
            }),
            "get_weather" => Ok(McpToolResult::text_content(format!(
                "Sunny at {},{}",
                arguments["latitude"], arguments["longitude"]
            ))),
            other => Ok(McpToolResult::text_content(format!("{other} ok"))),
        }
    }

    async fn close(&self) {
        self.shared.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuth
// ─────────────────────────────────────────────────────────────────────────────

/// Saves a session with state `state-<server id>` and returns a fixed URL.
pub struct FakeOAuth {
    tokens: Arc<MemoryTokenStore>,
}

#[async_trait]
impl OAuthFlow for FakeOAuth {
    async fn begin_authorization(
        &self,
        server: &McpServer,
        _www_authenticate: Option<&str>,
    ) -> Result<String, OAuthError> {
        let state = format!("state-{}", server.id);
        self.tokens
            .save_session(&OAuthSession {
                state: state.clone(),
                server_id: server.id.clone(),
                code_verifier: "verifier".to_string(),
                client_id: "client".to_string(),
                client_secret: None,
                redirect_uri: "http://localhost/callback".to_string(),
                token_endpoint: "https://auth.example/token".to_string(),
                created_at: Utc::now(),
            })
            .await?;
        Ok(format!("https://auth.example/authorize?state={state}"))
    }

    async fn exchange_code(
        &self,
        _session: &OAuthSession,
        code: &str,
    ) -> Result<OAuthTokens, OAuthError> {
        if code == "bad" {
            return Err(OAuthError::Exchange("invalid_grant".to_string()));
        }
        Ok(OAuthTokens::bearer(format!("token-for-{code}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<AppEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub repo: Arc<MemoryRepo>,
    pub tokens: Arc<MemoryTokenStore>,
    pub transports: Arc<FakeTransportFactory>,
    pub events: Arc<RecordingEmitter>,
    oauth: Arc<FakeOAuth>,
}

impl Harness {
    pub fn new() -> Self {
        let tokens = Arc::new(MemoryTokenStore::default());
        Self {
            repo: Arc::new(MemoryRepo::default()),
            transports: Arc::new(FakeTransportFactory::new(Arc::clone(&tokens))),
            oauth: Arc::new(FakeOAuth {
                tokens: Arc::clone(&tokens),
            }),
            events: Arc::new(RecordingEmitter::default()),
            tokens,
        }
    }

    pub fn deps(&self) -> McpDeps {
        McpDeps {
            repository: self.repo.clone(),
            tokens: self.tokens.clone(),
            transports: self.transports.clone(),
            oauth: self.oauth.clone(),
            emitter: self.events.clone(),
        }
    }

    pub fn registry(&self) -> ClientRegistry {
        ClientRegistry::new(self.deps())
    }

    pub fn service(&self) -> McpService {
        McpService::new(self.deps())
    }

    pub fn stats(&self) -> &FakeStats {
        &self.transports.stats
    }

    /// Store a config directly, bypassing the facade.
    pub async fn seed(&self, server: NewMcpServer, behavior: FakeBehavior) -> McpServer {
        let saved = self.repo.save(server).await.unwrap();
        self.transports.set(&saved.id, behavior);
        saved
    }
}

/// The `weather` stdio server owned by alice, id `s1`.
pub fn weather_server() -> NewMcpServer {
    NewMcpServer::new_stdio("weather", "weather-mcp", vec![], "alice").with_id("s1")
}

pub fn weather_behavior() -> FakeBehavior {
    FakeBehavior {
        tools: vec![
            McpTool::new("get_weather")
                .with_description("Current weather for a location")
                .with_input_schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "latitude": { "type": "number" },
                        "longitude": { "type": "number" }
                    },
                    "required": ["latitude", "longitude"]
                })),
            McpTool::new("slow"),
            McpTool::new("explode"),
        ],
        ..FakeBehavior::default()
    }
}
