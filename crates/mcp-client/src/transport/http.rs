//! Streamable HTTP transport

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mcp_protocol::{
    McpMessage, DEFAULT_REQUEST_TIMEOUT, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::sse::SseDecoder;
use super::Transport;
use crate::config::ServerEntry;
use crate::error::{ClientError, Result};
use crate::handlers::ClientHandlers;

/// MCP client over streamable HTTP
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
    session_id: RwLock<Option<String>>,
    protocol_version: RwLock<Option<String>>,
    handlers: ClientHandlers,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(entry: &ServerEntry, handlers: ClientHandlers) -> Result<Self> {
        let ServerEntry::Http {
            url,
            transport,
            headers,
        } = entry
        else {
            return Err(ClientError::Config(format!(
                "{} is not an HTTP server",
                entry.describe()
            )));
        };

        if let Some(kind) = transport {
            if kind != "http" && kind != "streamable-http" {
                warn!(%url, transport = %kind, "only streamable HTTP is supported, trying it anyway");
            }
        }

        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::Config(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::Config(format!("header {name}: {e}")))?;
            default_headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            endpoint: url.clone(),
            session_id: RwLock::new(None),
            protocol_version: RwLock::new(None),
            handlers,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override how long a request may take, server round trips included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    async fn post(&self, message: &McpMessage) -> Result<Response> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(message);

        if let Some(session) = self.session_id.read().await.as_deref() {
            request = request.header(MCP_SESSION_ID_HEADER, session);
        }
        if let Some(version) = self.protocol_version.read().await.as_deref() {
            request = request.header(MCP_PROTOCOL_VERSION_HEADER, version);
        }

        let response = request.send().await?;

        if let Some(session) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            let mut current = self.session_id.write().await;
            if current.as_deref() != Some(session) {
                debug!(session_id = %session, "session assigned");
                *current = Some(session.to_string());
            }
        }

        Ok(response)
    }

    async fn exchange(&self, id: &str, message: McpMessage) -> Result<McpMessage> {
        let response = check_status(self.post(&message).await?).await?;
        if response.status() == StatusCode::ACCEPTED {
            return Err(ClientError::Closed);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("text/event-stream") {
            return self.read_stream(id, response).await;
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read an SSE response until the answer to `id` shows up, handling
    /// whatever the server sends first
    async fn read_stream(&self, id: &str, response: Response) -> Result<McpMessage> {
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = stream.next().await {
            for data in decoder.push(&chunk?) {
                if let Some(answer) = self.dispatch(id, &data).await? {
                    return Ok(answer);
                }
            }
        }
        if let Some(data) = decoder.finish() {
            if let Some(answer) = self.dispatch(id, &data).await? {
                return Ok(answer);
            }
        }

        Err(ClientError::Closed)
    }

    async fn dispatch(&self, id: &str, data: &str) -> Result<Option<McpMessage>> {
        let message: McpMessage = match serde_json::from_str(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed SSE event: {}", e);
                return Ok(None);
            }
        };

        if message.is_response() {
            if message.id_key().as_deref() == Some(id) {
                return Ok(Some(message));
            }
            warn!("Response to unknown request");
        } else if message.is_request() {
            let answer = self.handlers.handle_request(message).await;
            check_status(self.post(&answer).await?).await?;
        } else if message.is_notification() {
            self.handlers.handle_notification(message).await;
        }
        Ok(None)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = Uuid::new_v4().to_string();
        let message = McpMessage::request(id.clone(), method, params);
        debug!(%method, %id, "sending request");

        let response = tokio::time::timeout(self.timeout, self.exchange(&id, message))
            .await
            .map_err(|_| ClientError::Timeout(method.to_string()))??;
        Ok(response.into_result()?)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let message = McpMessage::notification(method, params);
        check_status(self.post(&message).await?).await?;
        Ok(())
    }

    async fn set_protocol_version(&self, version: &str) {
        *self.protocol_version.write().await = Some(version.to_string());
    }

    async fn close(&self) -> Result<()> {
        let Some(session) = self.session_id.write().await.take() else {
            return Ok(());
        };

        let response = self
            .http
            .delete(self.endpoint.clone())
            .header(MCP_SESSION_ID_HEADER, session.as_str())
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => debug!(session_id = %session, "session closed"),
            StatusCode::METHOD_NOT_ALLOWED => debug!("server does not support ending sessions"),
            status => warn!(%status, "failed to end session"),
        }
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::HttpStatus { status, body })
}
