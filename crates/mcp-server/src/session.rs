//! Per-client session state

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mcp_protocol::{
    close_pending, ClientCapabilities, Implementation, InitializeParams, LoggingLevel,
    PendingRequests,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default)]
struct SessionState {
    client_info: Option<Implementation>,
    capabilities: ClientCapabilities,
    protocol_version: Option<String>,
    log_level: LoggingLevel,
    initialized: bool,
}

/// A request task of this session that can still be aborted
#[derive(Debug)]
pub(crate) struct RunningRequest {
    ticket: u64,
    task: AbortHandle,
}

/// What the server knows about one connected client.
///
/// Request ids are only unique per client, so the requests a session is
/// running and the server requests it still has to answer live here.
#[derive(Debug)]
pub struct Session {
    id: String,
    state: RwLock<SessionState>,
    /// Requests still running, keyed by `request_key`
    in_flight: Mutex<HashMap<String, RunningRequest>>,
    next_ticket: AtomicU64,
    pending: PendingRequests,
}

impl Session {
    /// Create a session with a fresh random id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: RwLock::new(SessionState::default()),
            in_flight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
            pending: PendingRequests::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Server-to-client requests waiting for this client's answer
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Track a request task under `key` while `spawn` starts it.
    ///
    /// The map stays locked until the task is registered, so a task that
    /// finishes at once still finds its own entry to remove.
    pub(crate) async fn track<F>(&self, key: String, spawn: F)
    where
        F: FnOnce(u64) -> AbortHandle,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut in_flight = self.in_flight.lock().await;
        let task = spawn(ticket);
        if let Some(previous) = in_flight.insert(key.clone(), RunningRequest { ticket, task }) {
            debug!(
                session_id = %self.id,
                request = %key,
                ticket = previous.ticket,
                "request id reused while running"
            );
        }
    }

    /// Forget a finished request, unless `key` was reused by a newer one
    pub(crate) async fn finish(&self, key: &str, ticket: u64) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(key).is_some_and(|running| running.ticket == ticket) {
            in_flight.remove(key);
        }
    }

    /// Abort a running request, returning whether there was one
    pub async fn cancel(&self, key: &str) -> bool {
        match self.in_flight.lock().await.remove(key) {
            Some(running) => {
                running.task.abort();
                true
            }
            None => false,
        }
    }

    /// Number of requests still running
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Abort every running request and fail every pending server request
    pub async fn close(&self) {
        let running: Vec<_> = self.in_flight.lock().await.drain().collect();
        if !running.is_empty() {
            info!(
                session_id = %self.id,
                count = running.len(),
                "aborting requests of closed session"
            );
        }
        for (_, request) in running {
            request.task.abort();
        }
        close_pending(&self.pending).await;
    }

    /// Record what the client sent in `initialize`
    pub async fn initialize(&self, params: &InitializeParams, protocol_version: &str) {
        let mut state = self.state.write().await;
        state.client_info = Some(params.client_info.clone());
        state.capabilities = params.capabilities.clone();
        state.protocol_version = Some(protocol_version.to_string());
    }

    pub async fn mark_initialized(&self) {
        self.state.write().await.initialized = true;
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    pub async fn client_info(&self) -> Option<Implementation> {
        self.state.read().await.client_info.clone()
    }

    pub async fn client_capabilities(&self) -> ClientCapabilities {
        self.state.read().await.capabilities.clone()
    }

    pub async fn protocol_version(&self) -> Option<String> {
        self.state.read().await.protocol_version.clone()
    }

    /// Lowest level forwarded to the client
    pub async fn log_level(&self) -> LoggingLevel {
        self.state.read().await.log_level
    }

    pub async fn set_log_level(&self, level: LoggingLevel) {
        self.state.write().await.log_level = level;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Sessions of the HTTP transport, keyed by `Mcp-Session-Id`
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session
    pub async fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), session.clone());
        debug!(session_id = %session.id(), "session opened");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop a session from the store, handing it back if it existed.
    ///
    /// The caller decides whether its running requests should be closed.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
