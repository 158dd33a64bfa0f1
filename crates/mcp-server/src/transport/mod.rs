//! Transport implementations for MCP

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;
