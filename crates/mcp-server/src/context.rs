//! Request context handed to tool handlers.
//!
//! A [`Context`] is the tool's line back to the client for the duration of
//! one `tools/call`: log messages, progress updates, elicitation and sampling
//! all go through it. Code that is not handed the context explicitly can
//! fetch the active one with [`Context::current`].

use std::future::Future;
use std::sync::Arc;

use mcp_protocol::{
    methods, CreateMessageParams, CreateMessageResult, ElicitAction, ElicitParams, ElicitResult,
    LoggingLevel, LoggingMessageParams, McpError, ModelHint, ModelPreferences,
    Peer, ProgressParams, SamplingMessage,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::session::Session;

tokio::task_local! {
    static CURRENT: Context;
}

/// Types a tool can ask the user for
pub trait Elicitable: DeserializeOwned + Send {
    /// Flat JSON object schema describing the fields to collect
    fn requested_schema() -> Value;
}

/// How the user answered an elicitation
#[derive(Debug, Clone, PartialEq)]
pub enum Elicitation<T> {
    Accept(T),
    Decline,
    Cancel,
}

/// Builder for a `sampling/createMessage` request
#[derive(Debug, Clone)]
pub struct SamplingRequest {
    params: CreateMessageParams,
}

impl SamplingRequest {
    /// Default reply budget when the caller does not set one
    pub const DEFAULT_MAX_TOKENS: u32 = 512;

    /// Single user message
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::from_messages(vec![SamplingMessage::user(prompt)])
    }

    /// Full conversation
    pub fn from_messages(messages: Vec<SamplingMessage>) -> Self {
        Self {
            params: CreateMessageParams {
                messages,
                model_preferences: None,
                system_prompt: None,
                include_context: None,
                temperature: None,
                max_tokens: Self::DEFAULT_MAX_TOKENS,
                stop_sequences: Vec::new(),
            },
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.params.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = max_tokens;
        self
    }

    /// Add a model name hint
    pub fn prefer_model(mut self, name: impl Into<String>) -> Self {
        self.params
            .model_preferences
            .get_or_insert_with(ModelPreferences::default)
            .hints
            .push(ModelHint {
                name: Some(name.into()),
            });
        self
    }

    pub fn into_params(self) -> CreateMessageParams {
        self.params
    }
}

impl From<&str> for SamplingRequest {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for SamplingRequest {
    fn from(prompt: String) -> Self {
        Self::new(prompt)
    }
}

struct ContextInner {
    request_id: Value,
    progress_token: Option<Value>,
    session: Arc<Session>,
    peer: Peer,
}

/// Handle on the request currently being served
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn new(
        request_id: Value,
        progress_token: Option<Value>,
        session: Arc<Session>,
        peer: Peer,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id,
                progress_token,
                session,
                peer,
            }),
        }
    }

    /// The context of the request this task is serving.
    ///
    /// Fails outside of a tool call.
    pub fn current() -> Result<Context, McpError> {
        CURRENT
            .try_with(Clone::clone)
            .map_err(|_| McpError::internal_error("No active request context"))
    }

    /// Run `future` with this context installed as [`Context::current`]
    pub(crate) async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT.scope(self, future).await
    }

    pub fn request_id(&self) -> &Value {
        &self.inner.request_id
    }

    pub fn session_id(&self) -> &str {
        self.inner.session.id()
    }

    /// Send a log message to the client, subject to its `logging/setLevel`
    pub async fn log(
        &self,
        level: LoggingLevel,
        message: impl Into<String>,
        extra: Option<Value>,
    ) -> Result<(), McpError> {
        let message = message.into();
        debug!(%level, msg = %message, "tool log");

        if level < self.inner.session.log_level().await {
            return Ok(());
        }

        let params = LoggingMessageParams {
            level,
            logger: None,
            data: json!({ "msg": message, "extra": extra }),
        };
        self.inner
            .peer
            .notify(methods::NOTIFICATION_MESSAGE, Some(serde_json::to_value(params)?))
    }

    pub async fn debug(&self, message: impl Into<String>) -> Result<(), McpError> {
        self.log(LoggingLevel::Debug, message, None).await
    }

    pub async fn info(&self, message: impl Into<String>) -> Result<(), McpError> {
        self.log(LoggingLevel::Info, message, None).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> Result<(), McpError> {
        self.log(LoggingLevel::Warning, message, None).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), McpError> {
        self.log(LoggingLevel::Error, message, None).await
    }

    /// Report progress; silently skipped when the client did not ask for it
    pub async fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> Result<(), McpError> {
        let Some(token) = self.inner.progress_token.clone() else {
            return Ok(());
        };

        let params = ProgressParams {
            progress_token: token,
            progress,
            total,
            message,
        };
        self.inner
            .peer
            .notify(methods::NOTIFICATION_PROGRESS, Some(serde_json::to_value(params)?))
    }

    /// Ask the user for structured input
    pub async fn elicit<T: Elicitable>(
        &self,
        message: impl Into<String>,
    ) -> Result<Elicitation<T>, McpError> {
        if !self
            .inner
            .session
            .client_capabilities()
            .await
            .supports_elicitation()
        {
            return Err(McpError::method_not_found()
                .with_data(json!({ "detail": "client does not support elicitation" })));
        }

        let params = ElicitParams {
            message: message.into(),
            requested_schema: T::requested_schema(),
        };
        let value = self
            .inner
            .peer
            .request(methods::ELICITATION_CREATE, Some(serde_json::to_value(params)?))
            .await?;
        let result: ElicitResult = serde_json::from_value(value)
            .map_err(|e| McpError::invalid_params(format!("Malformed elicitation result: {e}")))?;

        debug!(action = ?result.action, "elicitation answered");
        match result.action {
            ElicitAction::Accept => {
                let content = result.content.unwrap_or_else(|| json!({}));
                let data = serde_json::from_value(content).map_err(|e| {
                    McpError::invalid_params(format!(
                        "Elicitation response does not match the requested schema: {e}"
                    ))
                })?;
                Ok(Elicitation::Accept(data))
            }
            ElicitAction::Decline => Ok(Elicitation::Decline),
            ElicitAction::Cancel => Ok(Elicitation::Cancel),
        }
    }

    /// Ask the client's language model for a completion
    pub async fn sample(
        &self,
        request: impl Into<SamplingRequest>,
    ) -> Result<CreateMessageResult, McpError> {
        if !self
            .inner
            .session
            .client_capabilities()
            .await
            .supports_sampling()
        {
            return Err(McpError::method_not_found()
                .with_data(json!({ "detail": "client does not support sampling" })));
        }

        let params = request.into().into_params();
        let value = self
            .inner
            .peer
            .request(
                methods::SAMPLING_CREATE_MESSAGE,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| McpError::invalid_params(format!("Malformed sampling result: {e}")))
    }
}
