//! Main MCP server orchestration

use std::net::SocketAddr;
use std::sync::Arc;

use mcp_protocol::{Implementation, McpPrompt, McpResource, McpResourceTemplate, McpTool};
use tracing::info;

use crate::error::Result;
use crate::handler::RequestHandler;
use crate::prompts::{PromptHandler, PromptRegistry};
use crate::resources::{ResourceHandler, ResourceRegistry};
use crate::tools::{ToolHandler, ToolRegistry};
use crate::transport::{HttpTransport, StdioTransport};

/// Server mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Newline-delimited JSON over stdin/stdout
    #[default]
    Stdio,
    /// Streamable HTTP on `addr`
    Http { addr: SocketAddr },
}

/// Collects the tools, resources and prompts of a server
pub struct McpServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
}

impl McpServerBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Usage hints returned to clients in `initialize`
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool(mut self, definition: McpTool, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.register(definition, handler);
        self
    }

    pub fn resource(mut self, definition: McpResource, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resources.register(definition, handler);
        self
    }

    pub fn resource_template(
        mut self,
        definition: McpResourceTemplate,
        handler: Arc<dyn ResourceHandler>,
    ) -> Self {
        self.resources.register_template(definition, handler);
        self
    }

    pub fn prompt(mut self, definition: McpPrompt, handler: Arc<dyn PromptHandler>) -> Self {
        self.prompts.register(definition, handler);
        self
    }

    pub fn build(self) -> McpServer {
        McpServer {
            handler: Arc::new(RequestHandler::new(
                Implementation::new(self.name, self.version),
                self.instructions,
                self.tools,
                self.resources,
                self.prompts,
            )),
        }
    }
}

/// MCP server
#[derive(Clone)]
pub struct McpServer {
    handler: Arc<RequestHandler>,
}

impl McpServer {
    /// Start describing a server called `name`
    pub fn builder(name: impl Into<String>) -> McpServerBuilder {
        McpServerBuilder {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            prompts: PromptRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.handler.server_info().name
    }

    pub fn handler(&self) -> Arc<RequestHandler> {
        self.handler.clone()
    }

    pub fn stdio_transport(&self) -> StdioTransport {
        StdioTransport::new(self.handler.clone())
    }

    pub fn http_transport(&self) -> HttpTransport {
        HttpTransport::new(self.handler.clone())
    }

    /// Run the server until the transport shuts down
    pub async fn run(&self, mode: ServerMode) -> Result<()> {
        match mode {
            ServerMode::Stdio => {
                info!(server = %self.name(), "Starting MCP server in stdio mode");
                self.stdio_transport().run().await
            }
            ServerMode::Http { addr } => {
                info!(server = %self.name(), %addr, "Starting MCP server in HTTP mode");
                self.http_transport().run(addr).await
            }
        }
    }
}
