//! Error types for mcp-client

use mcp_protocol::McpError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Protocol(#[from] McpError),

    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection closed")]
    Closed,

    #[error("No connected server handles `{0}`")]
    UnknownRoute(String),

    #[error("Server `{name}`: {source}")]
    Server {
        name: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Wrap an error with the name of the server it came from
    pub fn for_server(name: impl Into<String>, source: ClientError) -> Self {
        Self::Server {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// The JSON-RPC error the server answered with, if that is what this is
    pub fn protocol_error(&self) -> Option<&McpError> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Server { source, .. } => source.protocol_error(),
            _ => None,
        }
    }

    /// Translate a failure of [`mcp_protocol::Peer::request`]
    pub(crate) fn from_peer(method: &str, err: McpError) -> Self {
        match err.code {
            McpError::REQUEST_TIMEOUT => Self::Timeout(method.to_string()),
            McpError::INTERNAL_ERROR if err.message == "Connection closed" => Self::Closed,
            _ => Self::Protocol(err),
        }
    }
}
