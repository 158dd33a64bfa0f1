//! Callbacks for what a server sends the client unprompted

use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::{
    methods, parse_params, ClientCapabilities, CreateMessageParams, CreateMessageResult,
    ElicitParams, ElicitResult, LoggingLevel, LoggingMessageParams, McpError, McpMessage,
    ProgressParams,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

/// Answers `elicitation/create`
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    async fn elicit(&self, params: ElicitParams) -> Result<ElicitResult, McpError>;
}

/// Answers `sampling/createMessage`
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, McpError>;
}

/// Receives `notifications/progress`
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    async fn on_progress(&self, params: ProgressParams);
}

/// Receives `notifications/message`
#[async_trait]
pub trait LoggingHandler: Send + Sync {
    async fn on_log(&self, params: LoggingMessageParams);
}

/// The handlers a client was configured with.
///
/// Elicitation and sampling are only advertised to servers when a handler
/// is present.
#[derive(Clone, Default)]
pub struct ClientHandlers {
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    progress: Option<Arc<dyn ProgressHandler>>,
    logging: Option<Arc<dyn LoggingHandler>>,
}

impl ClientHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elicitation(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation = Some(handler);
        self
    }

    pub fn with_sampling(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling = Some(handler);
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = Some(handler);
        self
    }

    pub fn with_logging(mut self, handler: Arc<dyn LoggingHandler>) -> Self {
        self.logging = Some(handler);
        self
    }

    /// Capabilities to send in `initialize`
    pub fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            roots: None,
            sampling: self.sampling.as_ref().map(|_| json!({})),
            elicitation: self.elicitation.as_ref().map(|_| json!({})),
        }
    }

    /// Whether tool calls should ask for progress notifications
    pub fn wants_progress(&self) -> bool {
        self.progress.is_some()
    }

    /// Answer a request sent by the server
    pub async fn handle_request(&self, message: McpMessage) -> McpMessage {
        let id = message.id.clone().unwrap_or(Value::Null);
        debug!(method = %message.method_name(), "server request");

        let result = match message.method_name() {
            methods::PING => Ok(json!({})),
            methods::ELICITATION_CREATE => match &self.elicitation {
                Some(handler) => match parse_params(message.params) {
                    Ok(params) => handler.elicit(params).await.and_then(to_value),
                    Err(e) => Err(e),
                },
                None => Err(McpError::method_not_found()),
            },
            methods::SAMPLING_CREATE_MESSAGE => match &self.sampling {
                Some(handler) => match parse_params(message.params) {
                    Ok(params) => handler.create_message(params).await.and_then(to_value),
                    Err(e) => Err(e),
                },
                None => Err(McpError::method_not_found()),
            },
            _ => Err(McpError::method_not_found()),
        };

        match result {
            Ok(result) => McpMessage::response(id, result),
            Err(error) => McpMessage::error_response(Some(id), error),
        }
    }

    /// Route a notification sent by the server
    pub async fn handle_notification(&self, message: McpMessage) {
        match message.method_name() {
            methods::NOTIFICATION_PROGRESS => match parse_params::<ProgressParams>(message.params) {
                Ok(params) => match &self.progress {
                    Some(handler) => handler.on_progress(params).await,
                    None => debug!(progress = params.progress, "progress"),
                },
                Err(e) => warn!(error = %e, "malformed progress notification"),
            },
            methods::NOTIFICATION_MESSAGE => {
                match parse_params::<LoggingMessageParams>(message.params) {
                    Ok(params) => match &self.logging {
                        Some(handler) => handler.on_log(params).await,
                        None => log_server_message(&params),
                    },
                    Err(e) => warn!(error = %e, "malformed log notification"),
                }
            }
            other => debug!(method = %other, "ignoring notification"),
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, McpError> {
    Ok(serde_json::to_value(value)?)
}

/// Default sink for server log messages
fn log_server_message(params: &LoggingMessageParams) {
    let data = &params.data;
    match params.level {
        LoggingLevel::Debug => debug!(logger = ?params.logger, %data, "server log"),
        LoggingLevel::Info | LoggingLevel::Notice => info!(logger = ?params.logger, %data, "server log"),
        LoggingLevel::Warning => warn!(logger = ?params.logger, %data, "server log"),
        _ => error!(logger = ?params.logger, %data, "server log"),
    }
}
