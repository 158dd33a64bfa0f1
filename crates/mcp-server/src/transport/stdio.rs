//! stdio transport for MCP

use std::sync::Arc;

use mcp_protocol::{resolve, McpError, McpMessage, Peer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServerError};
use crate::handler::RequestHandler;
use crate::session::Session;

/// stdio transport for MCP protocol.
///
/// One line per JSON-RPC message in both directions. The whole connection
/// is a single session.
pub struct StdioTransport {
    handler: Arc<RequestHandler>,
}

impl StdioTransport {
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self { handler }
    }

    /// Serve the process's stdin and stdout until stdin closes
    pub async fn run(&self) -> Result<()> {
        info!("Starting MCP server on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve any byte stream pair
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new());
        let peer = Peer::new(outbound_tx, session.pending().clone());

        let writer_task = tokio::spawn(write_messages(writer, outbound_rx));

        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();

            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let message: McpMessage = match serde_json::from_str(line) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    let _ = peer.send(McpMessage::error_response(None, McpError::parse_error()));
                    continue;
                }
            };

            if message.is_response() {
                if !resolve(session.pending(), message).await {
                    warn!("Response to unknown request");
                }
            } else if message.is_request() {
                self.handler
                    .spawn_request(message, session.clone(), peer.clone())
                    .await;
            } else if message.is_notification() {
                self.handler.handle_notification(message, &session).await;
            } else {
                let id = message.id.clone();
                let _ = peer.send(McpMessage::error_response(id, McpError::invalid_request()));
            }
        }

        session.close().await;
        drop(peer);

        writer_task
            .await
            .map_err(|e| ServerError::Task(e.to_string()))?
    }
}

async fn write_messages<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<McpMessage>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let line = serde_json::to_string(&message)?;
        debug!("Sending: {}", line);
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
