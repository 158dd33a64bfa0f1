//! MCP request dispatch shared by every transport

use std::sync::Arc;

use mcp_protocol::{
    methods, negotiate_protocol_version, parse_optional_params, parse_params, request_key,
    CancelledParams, GetPromptParams, Implementation, InitializeParams, InitializeResult,
    McpError, McpMessage, PaginatedParams, Peer, PromptsListResult, ReadResourceParams,
    ReadResourceResult, ResourceTemplatesListResult, ResourcesListResult, ServerCapabilities,
    SetLevelParams, ToolCallParams, ToolCallResult, ToolsListResult,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::prompts::PromptRegistry;
use crate::resources::ResourceRegistry;
use crate::session::Session;
use crate::tools::ToolRegistry;

/// Handler for MCP requests
pub struct RequestHandler {
    info: Implementation,
    instructions: Option<String>,
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
}

impl RequestHandler {
    pub(crate) fn new(
        info: Implementation,
        instructions: Option<String>,
        tools: ToolRegistry,
        resources: ResourceRegistry,
        prompts: PromptRegistry,
    ) -> Self {
        Self {
            info,
            instructions,
            tools,
            resources,
            prompts,
        }
    }

    pub fn server_info(&self) -> &Implementation {
        &self.info
    }

    /// Capabilities advertised in `initialize`
    pub fn capabilities(&self) -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::default().enable_logging();
        if !self.tools.is_empty() {
            capabilities = capabilities.enable_tools();
        }
        if !self.resources.is_empty() {
            capabilities = capabilities.enable_resources();
        }
        if !self.prompts.is_empty() {
            capabilities = capabilities.enable_prompts();
        }
        capabilities
    }

    /// Handle a request and build its response
    pub async fn handle_request(
        &self,
        message: McpMessage,
        session: &Arc<Session>,
        peer: &Peer,
    ) -> McpMessage {
        let id = message.id.clone().unwrap_or(Value::Null);
        let method = message.method_name().to_string();
        debug!(%method, session_id = %session.id(), "handling request");

        let result = match method.as_str() {
            methods::INITIALIZE => self.handle_initialize(message.params, session).await,
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.handle_tools_list(message.params),
            methods::TOOLS_CALL => {
                self.handle_tools_call(id.clone(), message.params, session, peer)
                    .await
            }
            methods::RESOURCES_LIST => self.handle_resources_list(message.params),
            methods::RESOURCES_TEMPLATES_LIST => self.handle_templates_list(message.params),
            methods::RESOURCES_READ => self.handle_resources_read(message.params).await,
            methods::PROMPTS_LIST => self.handle_prompts_list(message.params),
            methods::PROMPTS_GET => self.handle_prompts_get(message.params).await,
            methods::LOGGING_SET_LEVEL => self.handle_set_level(message.params, session).await,
            _ => Err(McpError::method_not_found()),
        };

        match result {
            Ok(result) => McpMessage::response(id, result),
            Err(error) => {
                debug!(%method, code = error.code, error = %error.message, "request failed");
                McpMessage::error_response(Some(id), error)
            }
        }
    }

    /// Handle a notification from the client
    pub async fn handle_notification(&self, message: McpMessage, session: &Session) {
        match message.method_name() {
            methods::NOTIFICATION_INITIALIZED => {
                session.mark_initialized().await;
                info!(session_id = %session.id(), "Client initialized");
            }
            methods::NOTIFICATION_CANCELLED => {
                match parse_params::<CancelledParams>(message.params) {
                    Ok(params) => self.cancel(session, &params.request_id, params.reason).await,
                    Err(e) => warn!(error = %e, "malformed cancellation"),
                }
            }
            other => debug!(method = %other, "ignoring notification"),
        }
    }

    /// Run a request on its own task so it can be cancelled and so the
    /// connection keeps reading while the request talks back to the client.
    /// The response is sent through `peer`. The request is dropped without
    /// a response once nothing reads from `peer` any more.
    pub async fn spawn_request(self: &Arc<Self>, message: McpMessage, session: Arc<Session>, peer: Peer) {
        let Some(key) = message.id_key() else {
            return;
        };

        let handler = self.clone();
        let task_session = session.clone();
        let task_key = key.clone();
        session
            .track(key, move |ticket| {
                tokio::spawn(async move {
                    let response = tokio::select! {
                        response = handler.handle_request(message, &task_session, &peer) => {
                            Some(response)
                        }
                        _ = peer.closed() => None,
                    };
                    task_session.finish(&task_key, ticket).await;

                    match response {
                        Some(response) => {
                            if peer.send(response).is_err() {
                                debug!(request = %task_key, "connection closed before response");
                            }
                        }
                        None => debug!(request = %task_key, "client went away, request dropped"),
                    }
                })
                .abort_handle()
            })
            .await;
    }

    /// Abort a running request of `session`; it will not get a response
    pub async fn cancel(&self, session: &Session, request_id: &Value, reason: Option<String>) {
        let key = request_key(request_id);
        if session.cancel(&key).await {
            info!(session_id = %session.id(), request = %key, reason = ?reason, "request cancelled");
        } else {
            debug!(session_id = %session.id(), request = %key, "cancellation for unknown request");
        }
    }

    async fn handle_initialize(
        &self,
        params: Option<Value>,
        session: &Session,
    ) -> Result<Value, McpError> {
        let params: InitializeParams = parse_params(params)?;
        let version = negotiate_protocol_version(&params.protocol_version);

        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            requested = %params.protocol_version,
            negotiated = %version,
            "Initializing session"
        );
        session.initialize(&params, version).await;

        to_value(InitializeResult {
            protocol_version: version.to_string(),
            capabilities: self.capabilities(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    fn handle_tools_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let _: PaginatedParams = parse_optional_params(params)?;
        to_value(ToolsListResult {
            tools: self.tools.definitions(),
            next_cursor: None,
        })
    }

    async fn handle_tools_call(
        &self,
        request_id: Value,
        params: Option<Value>,
        session: &Arc<Session>,
        peer: &Peer,
    ) -> Result<Value, McpError> {
        let params: ToolCallParams = parse_params(params)?;
        let handler = self
            .tools
            .get(&params.name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        let progress_token = params.meta.and_then(|meta| meta.progress_token);
        let ctx = Context::new(request_id, progress_token, session.clone(), peer.clone());
        let arguments = params.arguments.unwrap_or(Value::Null);

        debug!(tool = %params.name, "Calling tool");
        let result = match ctx.clone().scope(handler.call(arguments, ctx)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool execution failed");
                ToolCallResult::error(e.to_string())
            }
        };

        to_value(result)
    }

    fn handle_resources_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let _: PaginatedParams = parse_optional_params(params)?;
        to_value(ResourcesListResult {
            resources: self.resources.resources(),
            next_cursor: None,
        })
    }

    fn handle_templates_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let _: PaginatedParams = parse_optional_params(params)?;
        to_value(ResourceTemplatesListResult {
            resource_templates: self.resources.templates(),
            next_cursor: None,
        })
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ReadResourceParams = parse_params(params)?;
        let contents = self.resources.read(&params.uri).await?;
        to_value(ReadResourceResult { contents })
    }

    fn handle_prompts_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let _: PaginatedParams = parse_optional_params(params)?;
        to_value(PromptsListResult {
            prompts: self.prompts.definitions(),
            next_cursor: None,
        })
    }

    async fn handle_prompts_get(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: GetPromptParams = parse_params(params)?;
        let result = self
            .prompts
            .get(&params.name, params.arguments.unwrap_or_default())
            .await?;
        to_value(result)
    }

    async fn handle_set_level(
        &self,
        params: Option<Value>,
        session: &Session,
    ) -> Result<Value, McpError> {
        let params: SetLevelParams = parse_params(params)?;
        session.set_log_level(params.level).await;
        debug!(level = %params.level, "log level changed");
        Ok(json!({}))
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, McpError> {
    Ok(serde_json::to_value(value)?)
}
