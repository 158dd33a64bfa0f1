//! Shared fixtures: in-memory connections and handlers that record what the
//! server sent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcp_client::{
    Client, ClientHandlers, ElicitationHandler, LoggingHandler, ProgressHandler, SamplingHandler,
};
use mcp_demos::advanced::{self, AdvancedOptions};
use mcp_protocol::{
    CreateMessageParams, CreateMessageResult, ElicitParams, ElicitResult, LoggingMessageParams,
    McpError, ProgressParams,
};
use mcp_server::McpServer;
use tokio::io::duplex;

pub fn advanced_server() -> McpServer {
    advanced::build_server(AdvancedOptions {
        item_delay: Duration::ZERO,
    })
}

/// Serve `server` over an in-memory pipe and connect a client to it
pub async fn connect(server: McpServer, handlers: ClientHandlers) -> Client {
    let (client_io, server_io) = duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    tokio::spawn(async move {
        server
            .stdio_transport()
            .serve(server_read, server_write)
            .await
    });

    let (client_read, client_write) = tokio::io::split(client_io);
    Client::connect_io(client_read, client_write, handlers)
        .await
        .unwrap()
}

/// Plays the user and the model, and remembers every notification
pub struct Recorder {
    elicitation: ElicitResult,
    reply: String,
    pub elicited: Mutex<Vec<ElicitParams>>,
    pub sampled: Mutex<Vec<CreateMessageParams>>,
    pub progress: Mutex<Vec<(f64, Option<f64>)>>,
    pub logs: Mutex<Vec<LoggingMessageParams>>,
}

impl Recorder {
    pub fn new(elicitation: ElicitResult, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            elicitation,
            reply: reply.to_string(),
            elicited: Mutex::default(),
            sampled: Mutex::default(),
            progress: Mutex::default(),
            logs: Mutex::default(),
        })
    }

    pub fn handlers(self: &Arc<Self>) -> ClientHandlers {
        ClientHandlers::new()
            .with_elicitation(self.clone())
            .with_sampling(self.clone())
            .with_progress(self.clone())
            .with_logging(self.clone())
    }
}

#[async_trait]
impl ElicitationHandler for Recorder {
    async fn elicit(&self, params: ElicitParams) -> Result<ElicitResult, McpError> {
        self.elicited.lock().unwrap().push(params);
        Ok(self.elicitation.clone())
    }
}

#[async_trait]
impl SamplingHandler for Recorder {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, McpError> {
        self.sampled.lock().unwrap().push(params);
        Ok(CreateMessageResult::assistant_text("recorder", self.reply.clone()))
    }
}

#[async_trait]
impl ProgressHandler for Recorder {
    async fn on_progress(&self, params: ProgressParams) {
        self.progress
            .lock()
            .unwrap()
            .push((params.progress, params.total));
    }
}

#[async_trait]
impl LoggingHandler for Recorder {
    async fn on_log(&self, params: LoggingMessageParams) {
        self.logs.lock().unwrap().push(params);
    }
}
