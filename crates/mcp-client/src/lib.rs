//! # mcp-client
//!
//! MCP client used by the demo clients. A [`Client`] talks to one server
//! over stdio (child process) or streamable HTTP; a [`MultiClient`] joins
//! several configured servers behind namespaced names. Elicitation,
//! sampling, progress and server log messages are delivered to the
//! [`ClientHandlers`] the connection was opened with.

mod client;
mod config;
mod error;
mod handlers;
mod multi;
pub mod transport;

pub use client::{Client, CLIENT_NAME};
pub use config::{ClientConfig, ServerEntry};
pub use error::{ClientError, Result};
pub use handlers::{
    ClientHandlers, ElicitationHandler, LoggingHandler, ProgressHandler, SamplingHandler,
};
pub use multi::{prefix_name, prefix_uri, MultiClient};
