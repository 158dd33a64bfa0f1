//! Client transports

mod http;
mod sse;
mod stdio;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ServerEntry;
use crate::error::Result;
use crate::handlers::ClientHandlers;

pub use http::HttpTransport;
pub use sse::SseDecoder;
pub use stdio::StdioTransport;

/// One connection to a server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its result
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// Send a notification
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Record the version agreed in `initialize`
    async fn set_protocol_version(&self, _version: &str) {}

    /// Shut the connection down
    async fn close(&self) -> Result<()>;
}

/// Open the transport an entry describes
pub async fn connect(entry: &ServerEntry, handlers: ClientHandlers) -> Result<Box<dyn Transport>> {
    match entry {
        ServerEntry::Http { .. } => Ok(Box::new(HttpTransport::new(entry, handlers)?)),
        ServerEntry::Stdio { .. } => Ok(Box::new(StdioTransport::spawn(entry, handlers)?)),
    }
}
