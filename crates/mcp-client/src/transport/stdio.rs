//! stdio transport: the server is a child process

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mcp_protocol::{close_pending, resolve, McpMessage, PendingRequests, Peer};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Transport;
use crate::config::ServerEntry;
use crate::error::{ClientError, Result};
use crate::handlers::ClientHandlers;

/// How long a child gets to exit after its stdin closes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Newline-delimited JSON over a pair of byte streams
pub struct StdioTransport {
    peer: Peer,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    child: Mutex<Option<Child>>,
}

impl StdioTransport {
    /// Launch the command of a stdio entry and talk to it
    pub fn spawn(entry: &ServerEntry, handlers: ClientHandlers) -> Result<Self> {
        let ServerEntry::Stdio {
            command,
            args,
            env,
            cwd,
        } = entry
        else {
            return Err(ClientError::Config(format!(
                "{} is not a stdio server",
                entry.describe()
            )));
        };

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| ClientError::Spawn {
            command: entry.describe(),
            source,
        })?;
        info!(command = %entry.describe(), pid = ?child.id(), "Launched MCP server");

        let stdin = child.stdin.take().ok_or(ClientError::Closed)?;
        let stdout = child.stdout.take().ok_or(ClientError::Closed)?;

        let mut transport = Self::from_io(stdout, stdin, handlers);
        transport.child = Mutex::new(Some(child));
        Ok(transport)
    }

    /// Talk MCP over an existing reader/writer pair
    pub fn from_io<R, W>(reader: R, writer: W, handlers: ClientHandlers) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let pending = PendingRequests::default();
        let peer = Peer::new(outbound_tx, pending.clone());

        let writer = tokio::spawn(write_messages(writer, outbound_rx));
        let reader = tokio::spawn(read_messages(reader, peer.clone(), pending, handlers));

        Self {
            peer,
            reader,
            writer,
            child: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.peer
            .request(method, params)
            .await
            .map_err(|e| ClientError::from_peer(method, e))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.peer
            .notify(method, params)
            .map_err(|_| ClientError::Closed)
    }

    async fn close(&self) -> Result<()> {
        // dropping the writer closes the child's stdin
        self.writer.abort();
        self.reader.abort();

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(status) => {
                    let status = status?;
                    debug!(?status, "MCP server exited");
                }
                Err(_) => {
                    warn!("MCP server did not exit, killing it");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }
}

async fn write_messages<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<McpMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode message: {}", e);
                continue;
            }
        };
        debug!("Sending: {}", line);
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("Server stdin closed: {}", e);
            break;
        }
    }
}

async fn read_messages<R>(reader: R, peer: Peer, pending: PendingRequests, handlers: ClientHandlers)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read from server: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        debug!("Received: {}", line);
        let message: McpMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed message from server: {}", e);
                continue;
            }
        };

        if message.is_response() {
            if !resolve(&pending, message).await {
                warn!("Response to unknown request");
            }
        } else if message.is_request() {
            let handlers = handlers.clone();
            let peer = peer.clone();
            tokio::spawn(async move {
                let response = handlers.handle_request(message).await;
                if peer.send(response).is_err() {
                    debug!("connection closed before answering server request");
                }
            });
        } else if message.is_notification() {
            handlers.handle_notification(message).await;
        }
    }

    debug!("server output closed");
    close_pending(&pending).await;
}
