//! Connection registry: the only owner of client handles.
//!
//! At most one handle exists per server id. Handle creation is
//! single-flight: the first `get_client` for an id spawns a creation task
//! and publishes its outcome on a `watch` channel; concurrent callers
//! subscribe to the same channel. The task runs detached, so a caller that
//! stops waiting only detaches itself.
//!
//! `refresh_client` and `remove_client` supersede an in-flight creation by
//! dropping its flight entry. The creation notices at install time, closes
//! its handle instead of inserting it, and its waiters retry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{RwLock, watch};
use tokio::task::JoinSet;

use toolhub_core::{
    AppEvent, McpErrorInfo, McpRepositoryError, McpServerStatus, McpServiceError, NewMcpServer,
};

use crate::client::{McpClient, Resume};
use crate::service::McpDeps;

/// Result of one creation task.
#[derive(Clone)]
enum Outcome {
    Ready(Arc<McpClient>),
    Missing,
    Superseded,
    Failed(McpRepositoryError),
}

struct Flight {
    ticket: u64,
    rx: watch::Receiver<Option<Outcome>>,
}

struct RegistryInner {
    deps: McpDeps,
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
    flights: Mutex<HashMap<String, Flight>>,
    next_ticket: AtomicU64,
}

/// Owned by a creation task. Retires the flight however the task ends, so
/// a panicking or aborted creation does not leave the id joined to a dead
/// channel.
struct FlightGuard {
    registry: ClientRegistry,
    id: String,
    ticket: u64,
    tx: watch::Sender<Option<Outcome>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.registry.finish_flight(&self.id, self.ticket);
    }
}

/// In-process mapping from server id to client handle.
#[derive(Clone)]
pub struct ClientRegistry {
    inner: Arc<RegistryInner>,
}

impl ClientRegistry {
    pub fn new(deps: McpDeps) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                deps,
                clients: RwLock::new(HashMap::new()),
                flights: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<String, Flight>> {
        self.inner
            .flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Existing non-stale handle, or a newly created one.
    ///
    /// `Ok(None)` when no configuration exists for `id`. Repository errors
    /// propagate unchanged.
    pub async fn get_client(&self, id: &str) -> Result<Option<Arc<McpClient>>, McpServiceError> {
        loop {
            let mut rx = {
                let clients = self.inner.clients.read().await;
                if let Some(client) = clients.get(id) {
                    if !client.is_stale().await {
                        return Ok(Some(Arc::clone(client)));
                    }
                }
                // Joined under the read lock: `install` retires the flight
                // while holding the write lock.
                self.join_or_start(id)
            };
            let outcome = rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| {
                    McpServiceError::Internal(format!("client creation for {id} was aborted"))
                })?
                .clone();

            match outcome {
                Some(Outcome::Ready(client)) => return Ok(Some(client)),
                Some(Outcome::Missing) => return Ok(None),
                Some(Outcome::Failed(e)) => return Err(e.into()),
                Some(Outcome::Superseded) | None => {
                    tracing::debug!(server_id = %id, "Client creation superseded, retrying");
                }
            }
        }
    }

    /// Attach to the in-flight creation for `id`, starting one if needed.
    fn join_or_start(&self, id: &str) -> watch::Receiver<Option<Outcome>> {
        let mut flights = self.flights();
        if let Some(flight) = flights.get(id) {
            return flight.rx.clone();
        }

        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = watch::channel(None);
        flights.insert(
            id.to_string(),
            Flight {
                ticket,
                rx: rx.clone(),
            },
        );
        drop(flights);

        let guard = FlightGuard {
            registry: self.clone(),
            id: id.to_string(),
            ticket,
            tx,
        };
        tokio::spawn(async move {
            let outcome = guard.registry.create(&guard.id, ticket).await;
            guard.tx.send_replace(Some(outcome));
        });

        rx
    }

    /// Load config, connect, install. Runs detached from any caller.
    async fn create(&self, id: &str, ticket: u64) -> Outcome {
        let server = match self.inner.deps.repository.find_by_id(id).await {
            Ok(Some(server)) => server,
            Ok(None) => {
                self.finish_flight(id, ticket);
                return Outcome::Missing;
            }
            Err(e) => {
                self.finish_flight(id, ticket);
                return Outcome::Failed(e);
            }
        };

        let deps = &self.inner.deps;
        let transport = deps.transports.create(&server);
        let client = Arc::new(McpClient::new(
            server,
            transport,
            Arc::clone(&deps.tokens),
            Arc::clone(&deps.oauth),
        ));
        let status = client.connect().await;

        if !self.install(id, ticket, Arc::clone(&client)).await {
            client.disconnect().await;
            return Outcome::Superseded;
        }

        self.announce(&client, &status).await;
        Outcome::Ready(client)
    }

    /// Insert `client` if its creation is still current.
    async fn install(&self, id: &str, ticket: u64, client: Arc<McpClient>) -> bool {
        let mut clients = self.inner.clients.write().await;
        let replaced = {
            let mut flights = self.flights();
            if flights.get(id).is_none_or(|f| f.ticket != ticket) {
                return false;
            }
            flights.remove(id);
            clients.insert(id.to_string(), client)
        };
        drop(clients);

        if let Some(old) = replaced {
            old.disconnect().await;
        }
        true
    }

    fn finish_flight(&self, id: &str, ticket: u64) {
        let mut flights = self.flights();
        if flights.get(id).is_some_and(|f| f.ticket == ticket) {
            flights.remove(id);
        }
    }

    async fn announce(&self, client: &McpClient, status: &McpServerStatus) {
        let deps = &self.inner.deps;
        match status {
            McpServerStatus::Connected => {
                let tool_count = client.tools().await.len();
                deps.emitter.emit(AppEvent::mcp_client_connected(
                    client.id(),
                    client.name(),
                    tool_count,
                ));
                if let Err(e) = deps.repository.update_last_connected(client.id()).await {
                    tracing::warn!(server_id = %client.id(), error = %e, "Failed to record last connection");
                }
            }
            McpServerStatus::Authorizing => {
                if let Some(url) = client.authorization_url().await {
                    deps.emitter.emit(AppEvent::mcp_client_authorizing(
                        client.id(),
                        client.name(),
                        url,
                    ));
                }
            }
            McpServerStatus::Error(message) => {
                deps.emitter
                    .emit(AppEvent::mcp_server_error(McpErrorInfo::connection(
                        Some(client.id().to_string()),
                        client.name(),
                        message.clone(),
                    )));
            }
            McpServerStatus::Connecting | McpServerStatus::Disconnected => {}
        }
    }

    /// Snapshot of every known handle, ordered by name.
    pub async fn get_clients(&self) -> Vec<Arc<McpClient>> {
        let mut clients: Vec<_> = self.inner.clients.read().await.values().cloned().collect();
        clients.sort_by(|a, b| a.name().cmp(b.name()));
        clients
    }

    /// Tear down the handle for `id` and create a fresh one.
    pub async fn refresh_client(&self, id: &str) -> Result<Option<Arc<McpClient>>, McpServiceError> {
        self.teardown(id).await;
        tracing::debug!(server_id = %id, "Refreshing MCP client");
        self.get_client(id).await
    }

    /// Tear down the handle for `id` without recreating it.
    pub async fn remove_client(&self, id: &str) {
        if let Some(client) = self.teardown(id).await {
            self.inner
                .deps
                .emitter
                .emit(AppEvent::mcp_client_disconnected(client.id(), client.name()));
        }
    }

    /// Supersede any in-flight creation and drop the current handle.
    async fn teardown(&self, id: &str) -> Option<Arc<McpClient>> {
        self.flights().remove(id);
        let removed = self.inner.clients.write().await.remove(id);
        if let Some(client) = &removed {
            client.disconnect().await;
        }
        removed
    }

    /// Save a configuration, then rebuild its handle.
    pub async fn persist_client(&self, config: NewMcpServer) -> Result<Arc<McpClient>, McpServiceError> {
        let saved = self.inner.deps.repository.save(config).await?;

        self.inner
            .deps
            .emitter
            .emit(AppEvent::mcp_server_saved((&saved).into()));

        self.refresh_client(&saved.id)
            .await?
            .ok_or(McpServiceError::ConfigNotFound(saved.id))
    }

    /// Re-check tokens for an `authorizing` handle and reconnect in place.
    pub async fn resume_authorization(
        &self,
        id: &str,
    ) -> Result<Option<McpServerStatus>, McpServiceError> {
        let Some(client) = self.inner.clients.read().await.get(id).cloned() else {
            return Ok(None);
        };

        let resumed = client.resume_authorization().await?;
        if let Resume::Reconnected(status) = &resumed {
            if self.is_current(id, &client).await {
                self.announce(&client, status).await;
            }
        }
        Ok(Some(resumed.status().clone()))
    }

    async fn is_current(&self, id: &str, client: &Arc<McpClient>) -> bool {
        self.inner
            .clients
            .read()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, client))
    }

    /// Eagerly create handles for every enabled configuration.
    pub async fn hydrate(&self) -> Result<usize, McpServiceError> {
        let servers = self.inner.deps.repository.list().await?;

        let mut tasks = JoinSet::new();
        for server in servers.into_iter().filter(|s| s.enabled) {
            let registry = self.clone();
            tasks.spawn(async move {
                let result = registry.get_client(&server.id).await;
                (server, result)
            });
        }

        let mut count = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(_)))) => count += 1,
                Ok((server, Ok(None))) => {
                    tracing::debug!(server_id = %server.id, "MCP server removed during hydration");
                }
                Ok((server, Err(e))) => {
                    tracing::warn!(server_id = %server.id, server_name = %server.name, error = %e, "Failed to hydrate MCP client");
                }
                Err(e) => tracing::warn!(error = %e, "MCP hydration task failed"),
            }
        }

        tracing::info!(clients = count, "MCP clients hydrated");
        Ok(count)
    }

    /// Disconnect every handle and abandon in-flight creations.
    pub async fn shutdown(&self) {
        self.flights().clear();
        let clients: Vec<_> = self.inner.clients.write().await.drain().collect();

        for (_, client) in clients {
            client.disconnect().await;
        }
        tracing::debug!("MCP registry shut down");
    }
}
