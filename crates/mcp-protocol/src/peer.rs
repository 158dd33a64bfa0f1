//! Request/response correlation for one side of a connection.
//!
//! Whoever owns the transport feeds incoming responses into [`resolve`];
//! everything else talks to the other side through a [`Peer`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::types::{request_key, McpError, McpMessage};

/// How long to wait for the other side to answer a request.
///
/// Generous because elicitation waits on a human.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Outstanding requests keyed by [`request_key`]
pub type PendingRequests = Arc<Mutex<HashMap<String, oneshot::Sender<McpMessage>>>>;

/// Handle for sending messages to the other side of a connection
#[derive(Clone)]
pub struct Peer {
    outbound: mpsc::UnboundedSender<McpMessage>,
    pending: PendingRequests,
    timeout: Duration,
}

impl Peer {
    /// Create a peer writing into `outbound` and awaiting answers in `pending`
    pub fn new(outbound: mpsc::UnboundedSender<McpMessage>, pending: PendingRequests) -> Self {
        Self {
            outbound,
            pending,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue a raw message
    pub fn send(&self, message: McpMessage) -> Result<(), McpError> {
        self.outbound
            .send(message)
            .map_err(|_| McpError::internal_error("Connection closed"))
    }

    /// Resolves once nothing is reading what this peer sends
    pub async fn closed(&self) {
        self.outbound.closed().await
    }

    /// Send a notification
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.send(McpMessage::notification(method, params))
    }

    /// Send a request and wait for its result
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        debug!(%method, %id, "sending request");
        if let Err(err) = self.send(McpMessage::request(id.clone(), method, params)) {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(McpError::internal_error("Connection closed")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::request_timeout(method))
            }
        }
    }
}

/// Hand a response to whoever is waiting for it.
///
/// Returns `false` when nothing was waiting for that id.
pub async fn resolve(pending: &PendingRequests, response: McpMessage) -> bool {
    let Some(key) = response.id.as_ref().map(request_key) else {
        return false;
    };

    match pending.lock().await.remove(&key) {
        Some(waiter) => waiter.send(response).is_ok(),
        None => false,
    }
}

/// Fail every outstanding request, e.g. once the connection is gone
pub async fn close_pending(pending: &PendingRequests) {
    let drained: Vec<_> = pending.lock().await.drain().collect();
    if !drained.is_empty() {
        debug!(count = drained.len(), "dropping pending requests");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer() -> (Peer, mpsc::UnboundedReceiver<McpMessage>, PendingRequests) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = PendingRequests::default();
        (Peer::new(tx, pending.clone()), rx, pending)
    }

    #[tokio::test]
    async fn test_request_resolves_with_matching_response() {
        let (peer, mut rx, pending) = peer();

        let responder = tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.method.as_deref(), Some("ping"));
            let id = request.id.unwrap();
            assert!(resolve(&pending, McpMessage::response(id, json!({ "ok": true }))).await);
        });

        let result = peer.request("ping", None).await.unwrap();
        assert_eq!(result, json!({ "ok": true }));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_becomes_error() {
        let (peer, mut rx, pending) = peer();

        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            let response = McpMessage::error_response(request.id, McpError::method_not_found());
            resolve(&pending, response).await;
        });

        let err = peer.request("sampling/createMessage", None).await.unwrap_err();
        assert_eq!(err.code, McpError::METHOD_NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out() {
        let (peer, _rx, pending) = peer();
        let peer = peer.with_timeout(Duration::from_secs(5));

        let err = peer.request("elicitation/create", None).await.unwrap_err();
        assert_eq!(err.code, McpError::REQUEST_TIMEOUT);
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_when_receiver_dropped() {
        let (peer, rx, _pending) = peer();
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), peer.closed())
            .await
            .unwrap();
        assert!(peer.notify("notifications/progress", None).is_err());
    }

    #[tokio::test]
    async fn test_unmatched_response_is_reported() {
        let pending = PendingRequests::default();
        let response = McpMessage::response(json!("nobody"), json!({}));
        assert!(!resolve(&pending, response).await);
    }

    #[tokio::test]
    async fn test_close_pending_fails_waiters() {
        let (peer, _rx, pending) = peer();

        let waiter = tokio::spawn(async move { peer.request("ping", None).await });
        while pending.lock().await.is_empty() {
            tokio::task::yield_now().await;
        }
        close_pending(&pending).await;

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.code, McpError::INTERNAL_ERROR);
    }
}
