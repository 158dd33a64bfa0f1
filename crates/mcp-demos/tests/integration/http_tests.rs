//! The advanced server over loopback streamable HTTP

use std::time::Duration;

use mcp_client::transport::HttpTransport;
use mcp_client::{Client, ClientConfig, ClientError, MultiClient, ServerEntry};
use mcp_demos::advanced::{self, AdvancedOptions, INSTRUCTIONS};
use mcp_protocol::ElicitResult;
use mcp_server::McpServer;
use serde_json::json;
use tokio::net::TcpListener;

use super::common::{advanced_server, Recorder};

async fn serve(server: McpServer) -> ServerEntry {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.http_transport().serve(listener).await });
    ServerEntry::infer(&format!("http://{addr}/mcp")).unwrap()
}

async fn serve_advanced() -> ServerEntry {
    serve(advanced_server()).await
}

#[tokio::test]
async fn server_requests_travel_over_sse() {
    let entry = serve_advanced().await;
    let recorder = Recorder::new(
        ElicitResult::accept(json!({ "name": "Grace", "age": 85 })),
        "positive",
    );
    let client = Client::connect(&entry, recorder.handlers()).await.unwrap();
    assert_eq!(client.server_info().name, "MyAdvancedMCPServer");
    assert_eq!(client.instructions(), Some(INSTRUCTIONS));
    client.ping().await.unwrap();

    let result = client
        .call_tool("collect_user_info", json!({}))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("Hello Grace, you are 85 years old"));

    let result = client
        .call_tool("analyze_sentiment", json!({ "text": "Rust is fun" }))
        .await
        .unwrap();
    assert_eq!(
        result.structured_content,
        Some(json!({ "text": "Rust is fun", "sentiment": "positive" }))
    );

    let result = client
        .call_tool("process_items", json!({ "items": ["x", "y"] }))
        .await
        .unwrap();
    assert_eq!(
        result.structured_content,
        Some(json!({ "processed": 2, "results": ["X", "Y"] }))
    );
    assert_eq!(recorder.progress.lock().unwrap().len(), 3);

    client
        .call_tool("analyze_dataset", json!({ "dataset_name": "test.txt" }))
        .await
        .unwrap();
    assert_eq!(
        recorder.logs.lock().unwrap()[0].data["msg"],
        "Processing 10 data points"
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn multi_client_connects_from_config() {
    let entry = serve_advanced().await;
    let config = ClientConfig::single("my_advanced_server", entry);
    let recorder = Recorder::new(ElicitResult::cancel(), "neutral");

    let client = MultiClient::connect(&config, recorder.handlers())
        .await
        .unwrap();
    let result = client
        .call_tool("collect_user_info", json!({}))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("Operation cancelled"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn unreachable_server_names_the_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let entry = ServerEntry::infer(&format!("http://{addr}/mcp")).unwrap();
    let config = ClientConfig::single("gone", entry);
    let err = MultiClient::connect(&config, Default::default())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("gone"), "{err}");
}

#[tokio::test]
async fn slow_tool_hits_client_timeout() {
    let entry = serve(advanced::build_server(AdvancedOptions {
        item_delay: Duration::from_secs(60),
    }))
    .await;
    let handlers = Recorder::new(ElicitResult::cancel(), "neutral").handlers();
    let transport = HttpTransport::new(&entry, handlers.clone())
        .unwrap()
        .with_timeout(Duration::from_millis(300));
    let client = Client::with_transport(Box::new(transport), handlers)
        .await
        .unwrap();

    let err = client
        .call_tool("process_items", json!({ "items": ["slow"] }))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(ref method) if method == "tools/call"), "{err}");

    // the server dropped the abandoned call, the session still works
    client.ping().await.unwrap();
    client.close().await.unwrap();
}
