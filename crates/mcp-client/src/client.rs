//! A client session with one server

use std::collections::HashMap;

use mcp_protocol::{
    methods, GetPromptResult, Implementation, InitializeParams, InitializeResult, LoggingLevel,
    McpPrompt, McpResource, McpResourceTemplate, McpTool, PromptsListResult, ReadResourceResult,
    ResourceContents, ResourceTemplatesListResult, ResourcesListResult, ServerCapabilities,
    ToolCallResult, ToolsListResult, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerEntry;
use crate::error::{ClientError, Result};
use crate::handlers::ClientHandlers;
use crate::transport::{self, StdioTransport, Transport};

/// Name the client introduces itself with
pub const CLIENT_NAME: &str = "mcp-demos-client";

/// An initialized connection to one MCP server
pub struct Client {
    transport: Box<dyn Transport>,
    handlers: ClientHandlers,
    server: InitializeResult,
}

impl Client {
    /// Connect to the server an entry describes and run the handshake
    pub async fn connect(entry: &ServerEntry, handlers: ClientHandlers) -> Result<Self> {
        let transport = transport::connect(entry, handlers.clone()).await?;
        Self::with_transport(transport, handlers).await
    }

    /// Connect over an existing byte stream pair
    pub async fn connect_io<R, W>(reader: R, writer: W, handlers: ClientHandlers) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let transport = StdioTransport::from_io(reader, writer, handlers.clone());
        Self::with_transport(Box::new(transport), handlers).await
    }

    /// Run the handshake over an already open transport
    pub async fn with_transport(
        transport: Box<dyn Transport>,
        handlers: ClientHandlers,
    ) -> Result<Self> {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: handlers.capabilities(),
            client_info: Implementation::new(CLIENT_NAME, env!("CARGO_PKG_VERSION")),
        };

        let result = transport
            .request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;
        let server: InitializeResult = serde_json::from_value(result)?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&server.protocol_version.as_str()) {
            // best effort close, the version error is what matters
            let _ = transport.close().await;
            return Err(ClientError::Config(format!(
                "server speaks unsupported protocol version {}",
                server.protocol_version
            )));
        }

        transport.set_protocol_version(&server.protocol_version).await;
        transport
            .notify(methods::NOTIFICATION_INITIALIZED, None)
            .await?;

        info!(
            server = %server.server_info.name,
            version = %server.server_info.version,
            protocol = %server.protocol_version,
            "Connected to MCP server"
        );

        Ok(Self {
            transport,
            handlers,
            server,
        })
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server.server_info
    }

    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.server.capabilities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.server.instructions.as_deref()
    }

    pub fn protocol_version(&self) -> &str {
        &self.server.protocol_version
    }

    pub async fn ping(&self) -> Result<()> {
        self.transport.request(methods::PING, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        if self.server.capabilities.tools.is_none() {
            return Ok(Vec::new());
        }
        self.list_all(methods::TOOLS_LIST, |page: ToolsListResult| {
            (page.tools, page.next_cursor)
        })
        .await
    }

    pub async fn list_resources(&self) -> Result<Vec<McpResource>> {
        if self.server.capabilities.resources.is_none() {
            return Ok(Vec::new());
        }
        self.list_all(methods::RESOURCES_LIST, |page: ResourcesListResult| {
            (page.resources, page.next_cursor)
        })
        .await
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<McpResourceTemplate>> {
        if self.server.capabilities.resources.is_none() {
            return Ok(Vec::new());
        }
        self.list_all(
            methods::RESOURCES_TEMPLATES_LIST,
            |page: ResourceTemplatesListResult| (page.resource_templates, page.next_cursor),
        )
        .await
    }

    pub async fn list_prompts(&self) -> Result<Vec<McpPrompt>> {
        if self.server.capabilities.prompts.is_none() {
            return Ok(Vec::new());
        }
        self.list_all(methods::PROMPTS_LIST, |page: PromptsListResult| {
            (page.prompts, page.next_cursor)
        })
        .await
    }

    /// Call a tool. A failing tool is an `Ok` result with `isError` set.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let mut params = json!({ "name": name, "arguments": arguments });
        if self.handlers.wants_progress() {
            params["_meta"] = json!({ "progressToken": Uuid::new_v4().to_string() });
        }

        debug!(tool = %name, "calling tool");
        let result = self
            .transport
            .request(methods::TOOLS_CALL, Some(params))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let result = self
            .transport
            .request(methods::RESOURCES_READ, Some(json!({ "uri": uri })))
            .await?;
        let result: ReadResourceResult = serde_json::from_value(result)?;
        Ok(result.contents)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult> {
        let result = self
            .transport
            .request(
                methods::PROMPTS_GET,
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Ask the server to only forward log messages at `level` or above
    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<()> {
        if self.server.capabilities.logging.is_none() {
            warn!(server = %self.server.server_info.name, "server does not support logging");
            return Ok(());
        }
        self.transport
            .request(methods::LOGGING_SET_LEVEL, Some(json!({ "level": level })))
            .await?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        debug!(server = %self.server.server_info.name, "closing connection");
        self.transport.close().await
    }

    async fn list_all<P, T>(
        &self,
        method: &str,
        split: impl Fn(P) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let page = self.transport.request(method, Some(params)).await?;
            let page: P = serde_json::from_value(page)?;
            let (mut batch, next) = split(page);
            items.append(&mut batch);

            match next {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }
}
