//! # mcp-server
//!
//! MCP (Model Context Protocol) server runtime used by the demo servers.
//! Tools, resources and prompts are registered on an [`McpServer`] and served
//! over stdio or streamable HTTP. Tool handlers receive a [`Context`] for
//! logging, progress, elicitation and sampling.

mod context;
mod error;
mod handler;
mod prompts;
mod resources;
mod server;
mod session;
mod tools;
pub mod transport;
mod uri_template;

pub use context::{Context, Elicitable, Elicitation, SamplingRequest};
pub use error::{Result, ServerError, ToolError};
pub use handler::RequestHandler;
pub use prompts::{FnPrompt, PromptHandler, PromptReply};
pub use resources::{FnResource, ResourceHandler};
pub use server::{McpServer, McpServerBuilder, ServerMode};
pub use session::{Session, SessionStore};
pub use tools::{FnTool, NoArgs, ToolHandler};
pub use transport::{HttpTransport, StdioTransport};
pub use uri_template::UriTemplate;
