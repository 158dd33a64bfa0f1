//! # mcp-protocol
//!
//! Wire types for the Model Context Protocol as used by the demo servers and
//! clients, plus the request correlation both sides share:
//! - JSON-RPC envelope and error codes
//! - tools, resources, resource templates and prompts
//! - logging, progress, cancellation, elicitation and sampling messages

mod capabilities;
mod interaction;
pub mod methods;
mod peer;
mod types;

pub use capabilities::*;
pub use interaction::*;
pub use peer::{close_pending, resolve, PendingRequests, Peer, DEFAULT_REQUEST_TIMEOUT};
pub use types::*;
