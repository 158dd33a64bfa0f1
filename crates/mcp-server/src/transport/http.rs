//! Streamable HTTP transport for MCP
//!
//! Every client message is a `POST /mcp`. `initialize` opens a session and
//! is answered with plain JSON; any other request is answered with an SSE
//! stream that carries whatever the request sends back to the client (log
//! messages, progress, elicitation or sampling requests) and ends with the
//! request's own response. The client answers server requests by POSTing
//! the response, which is matched against that session's pending map.
//! Closing the stream or the session aborts the request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use mcp_protocol::{
    methods, resolve, McpError, McpMessage, Peer, MCP_PROTOCOL_VERSION_HEADER,
    MCP_SESSION_ID_HEADER, SUPPORTED_PROTOCOL_VERSIONS,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};
use crate::handler::RequestHandler;
use crate::session::{Session, SessionStore};

/// Shared state for HTTP handlers
struct AppState {
    handler: Arc<RequestHandler>,
    sessions: SessionStore,
}

/// HTTP transport for MCP protocol
pub struct HttpTransport {
    handler: Arc<RequestHandler>,
}

impl HttpTransport {
    pub fn new(handler: Arc<RequestHandler>) -> Self {
        Self { handler }
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            handler: self.handler.clone(),
            sessions: SessionStore::new(),
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any);

        Router::new()
            .route("/", get(health))
            .route("/health", get(health))
            .route(
                "/mcp",
                post(handle_post).get(handle_get).delete(handle_delete),
            )
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state)
    }

    /// Bind `addr` and serve until the process exits
    pub async fn run(&self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Starting MCP HTTP server on http://{}/mcp", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

async fn handle_get() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        "Server-initiated streams are not supported; POST to /mcp",
    )
}

async fn handle_delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = match session_id(&headers) {
        Some(id) => id,
        None => return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response(),
    };

    match state.sessions.remove(&session).await {
        Some(session) => {
            session.close().await;
            StatusCode::OK.into_response()
        }
        None => (StatusCode::NOT_FOUND, "Unknown session").into_response(),
    }
}

async fn handle_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message: McpMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(McpMessage::error_response(None, McpError::parse_error())),
            )
                .into_response();
        }
    };

    debug!(method = %message.method_name(), "HTTP message");

    if message.is_request() && message.method_name() == methods::INITIALIZE {
        return initialize(&state, message).await;
    }

    let session = match session_id(&headers) {
        Some(id) => match state.sessions.get(&id).await {
            Some(session) => session,
            None => return (StatusCode::NOT_FOUND, "Unknown session").into_response(),
        },
        None => return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response(),
    };

    if let Some(version) = headers
        .get(MCP_PROTOCOL_VERSION_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&version) {
            return (
                StatusCode::BAD_REQUEST,
                format!("Unsupported protocol version: {version}"),
            )
                .into_response();
        }
    }

    if message.is_response() {
        if !resolve(session.pending(), message).await {
            warn!(session_id = %session.id(), "Response to unknown request");
        }
        return StatusCode::ACCEPTED.into_response();
    }

    if message.is_notification() {
        state.handler.handle_notification(message, &session).await;
        return StatusCode::ACCEPTED.into_response();
    }

    if message.is_request() {
        return stream_request(&state, message, session).await;
    }

    let id = message.id.clone();
    (
        StatusCode::BAD_REQUEST,
        Json(McpMessage::error_response(id, McpError::invalid_request())),
    )
        .into_response()
}

async fn initialize(state: &AppState, message: McpMessage) -> Response {
    let session = state.sessions.create().await;

    // initialize cannot talk back to the client, so its peer goes nowhere
    let (tx, _rx) = mpsc::unbounded_channel();
    let peer = Peer::new(tx, session.pending().clone());
    let response = state.handler.handle_request(message, &session, &peer).await;

    if response.error.is_some() {
        state.sessions.remove(session.id()).await;
        return Json(response).into_response();
    }

    (
        [(MCP_SESSION_ID_HEADER, session.id().to_string())],
        Json(response),
    )
        .into_response()
}

async fn stream_request(state: &AppState, message: McpMessage, session: Arc<Session>) -> Response {
    let Some(key) = message.id_key() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let peer = Peer::new(tx, session.pending().clone());
    state.handler.spawn_request(message, session, peer).await;

    let stream = async_stream::stream! {
        while let Some(message) = rx.recv().await {
            let done = message.is_response() && message.id_key().as_deref() == Some(key.as_str());
            match Event::default().event("message").json_data(&message) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => warn!("Failed to encode SSE event: {}", e),
            }
            if done {
                break;
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Elicitable, Elicitation};
    use crate::error::ToolError;
    use crate::server::McpServer;
    use crate::tools::{FnTool, NoArgs};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mcp_protocol::{McpInputSchema, McpTool, ToolCallResult};
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Nickname {
        nickname: String,
    }

    impl Elicitable for Nickname {
        fn requested_schema() -> Value {
            json!({
                "type": "object",
                "properties": { "nickname": { "type": "string" } },
                "required": ["nickname"]
            })
        }
    }

    async fn chatty(_args: NoArgs, ctx: Context) -> std::result::Result<ToolCallResult, ToolError> {
        ctx.info("working").await?;
        Ok(ToolCallResult::text("done"))
    }

    async fn ask(_args: NoArgs, ctx: Context) -> std::result::Result<ToolCallResult, ToolError> {
        let reply = match ctx.elicit::<Nickname>("Nickname?").await? {
            Elicitation::Accept(answer) => answer.nickname,
            Elicitation::Decline | Elicitation::Cancel => "no nickname".to_string(),
        };
        Ok(ToolCallResult::text(reply))
    }

    fn router() -> Router {
        McpServer::builder("http-test")
            .tool(
                McpTool::new("chatty", "Logs then answers", McpInputSchema::default()),
                FnTool::new(chatty),
            )
            .tool(
                McpTool::new("ask", "Waits for the user", McpInputSchema::default()),
                FnTool::new(ask),
            )
            .build()
            .http_transport()
            .router()
    }

    fn post(body: Value, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/mcp")
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream");
        if let Some(session) = session {
            builder = builder.header(MCP_SESSION_ID_HEADER, session);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn initialize_body() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": { "elicitation": {} },
                "clientInfo": { "name": "test", "version": "1" }
            }
        })
    }

    fn sse_messages(body: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(body)
            .lines()
            .filter_map(|line| line.strip_prefix("data:").map(str::trim_start))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    async fn open_session(app: &Router) -> String {
        let response = app.clone().oneshot(post(initialize_body(), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.headers()[MCP_SESSION_ID_HEADER]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_initialize_returns_session_header() {
        let app = router();
        let response = app.oneshot(post(initialize_body(), None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(MCP_SESSION_ID_HEADER));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let message: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(message["result"]["serverInfo"]["name"], "http-test");
    }

    #[tokio::test]
    async fn test_missing_and_unknown_session() {
        let app = router();
        let ping = json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" });

        let response = app.clone().oneshot(post(ping.clone(), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post(ping, Some("nope"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_streams_notifications_then_response() {
        let app = router();
        let session = open_session(&app).await;

        let call = json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": { "name": "chatty" }
        });
        let response = app.oneshot(post(call, Some(&session))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let messages = sse_messages(&body);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["method"], "notifications/message");
        assert_eq!(messages[1]["id"], 5);
        assert_eq!(messages[1]["result"]["content"][0]["text"], "done");
    }

    #[tokio::test]
    async fn test_notification_is_accepted() {
        let app = router();
        let session = open_session(&app).await;

        let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        let response = app.oneshot(post(initialized, Some(&session))).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_unsupported_protocol_version() {
        let app = router();
        let session = open_session(&app).await;

        let mut request = post(
            json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" }),
            Some(&session),
        );
        request
            .headers_mut()
            .insert(MCP_PROTOCOL_VERSION_HEADER, "1999-01-01".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_not_allowed() {
        let response = router()
            .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_delete_ends_session() {
        let app = router();
        let session = open_session(&app).await;

        let delete = || {
            Request::delete("/mcp")
                .header(MCP_SESSION_ID_HEADER, session.as_str())
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_aborts_waiting_elicitation() {
        let app = router();
        let session = open_session(&app).await;

        let call = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "ask" }
        });
        let response = app.clone().oneshot(post(call, Some(&session))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let delete = Request::delete("/mcp")
            .header(MCP_SESSION_ID_HEADER, session.as_str())
            .body(Body::empty())
            .unwrap();
        let deleted = app.oneshot(delete).await.unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);

        // the stream ends without the tool ever answering
        let body = tokio::time::timeout(
            Duration::from_secs(5),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream still open after DELETE")
        .unwrap();
        let messages = sse_messages(&body);
        assert!(messages.iter().all(|m| m.get("result").is_none()));
        assert!(messages
            .iter()
            .all(|m| m["method"] == "elicitation/create" || m["method"].is_null()));
    }

    #[tokio::test]
    async fn test_responses_only_resolve_own_session() {
        let app = router();
        let asker = open_session(&app).await;
        let other = open_session(&app).await;

        let call = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "ask" }
        });
        let response = app.clone().oneshot(post(call, Some(&asker))).await.unwrap();
        let mut body = response.into_body().into_data_stream();

        // first event on the stream is the elicitation request
        let mut buffered = Vec::new();
        let elicitation = loop {
            let chunk = futures::StreamExt::next(&mut body).await.unwrap().unwrap();
            buffered.extend_from_slice(&chunk);
            if buffered.windows(2).any(|w| w == b"\n\n") {
                break sse_messages(&buffered).remove(0);
            }
        };
        assert_eq!(elicitation["method"], "elicitation/create");

        // a decline posted on the other session must not reach the tool
        let decline = json!({
            "jsonrpc": "2.0",
            "id": elicitation["id"],
            "result": { "action": "decline" }
        });
        let posted = app.clone().oneshot(post(decline, Some(&other))).await.unwrap();
        assert_eq!(posted.status(), StatusCode::ACCEPTED);

        let accept = json!({
            "jsonrpc": "2.0",
            "id": elicitation["id"],
            "result": { "action": "accept", "content": { "nickname": "ace" } }
        });
        let posted = app.oneshot(post(accept, Some(&asker))).await.unwrap();
        assert_eq!(posted.status(), StatusCode::ACCEPTED);

        let mut rest = Vec::new();
        while let Some(chunk) = futures::StreamExt::next(&mut body).await {
            rest.extend_from_slice(&chunk.unwrap());
        }
        let messages = sse_messages(&rest);
        assert_eq!(messages.last().unwrap()["result"]["content"][0]["text"], "ace");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let response = router()
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from("{oops"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
