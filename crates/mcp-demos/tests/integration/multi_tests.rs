//! Two servers behind one `MultiClient`, names namespaced by server

use std::collections::HashMap;

use indexmap::IndexMap;
use mcp_client::{ClientError, ClientHandlers, MultiClient};
use mcp_demos::basic;
use mcp_protocol::ElicitResult;
use serde_json::json;

use super::common::{advanced_server, connect, Recorder};

async fn both_servers() -> MultiClient {
    let recorder = Recorder::new(ElicitResult::decline(), "negative");
    let mut clients = IndexMap::new();
    clients.insert(
        "my_advanced_server".to_string(),
        connect(advanced_server(), recorder.handlers()).await,
    );
    clients.insert(
        "my_server".to_string(),
        connect(basic::build_server(), ClientHandlers::new()).await,
    );
    MultiClient::from_clients(clients)
}

#[tokio::test]
async fn listings_are_namespaced() {
    let client = both_servers().await;
    client.ping().await.unwrap();

    let tools: Vec<_> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(
        tools,
        vec![
            "my_advanced_server_process_file",
            "my_advanced_server_analyze_dataset",
            "my_advanced_server_collect_user_info",
            "my_advanced_server_process_items",
            "my_advanced_server_analyze_sentiment",
            "my_server_add",
        ]
    );

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].uri, "resource://my_server/greeting");
    assert_eq!(resources[0].name, "my_server_get_greeting");

    let templates = client.list_resource_templates().await.unwrap();
    assert_eq!(templates[0].uri_template, "data://my_server/{name}/greeting");

    let prompts: Vec<_> = client
        .list_prompts()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(
        prompts,
        vec!["my_server_ask_about_topic", "my_server_generate_code_request"]
    );
}

#[tokio::test]
async fn namespaced_names_route_back() {
    let client = both_servers().await;

    let result = client
        .call_tool("my_server_add", json!({ "a": 1, "b": 2 }))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("3"));

    let contents = client
        .read_resource("resource://my_server/greeting")
        .await
        .unwrap();
    assert_eq!(contents[0].text.as_deref(), Some("Hello from FastMCP Resources!"));
    assert_eq!(contents[0].uri, "resource://greeting");

    let contents = client
        .read_resource("data://my_server/bob/greeting")
        .await
        .unwrap();
    assert_eq!(
        contents[0].text.as_deref(),
        Some("Hello bob from FastMCP Resources!")
    );

    let prompt = client
        .get_prompt(
            "my_server_ask_about_topic",
            HashMap::from([("topic".to_string(), "AI".to_string())]),
        )
        .await
        .unwrap();
    assert_eq!(
        prompt.messages[0].content.as_text(),
        Some("Can you please explain the concept of 'AI'?")
    );

    let result = client
        .call_tool("my_advanced_server_analyze_sentiment", json!({ "text": "meh" }))
        .await
        .unwrap();
    assert_eq!(result.structured_content.unwrap()["sentiment"], "negative");

    let result = client
        .call_tool("my_advanced_server_collect_user_info", json!({}))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("Information not provided"));
}

#[tokio::test]
async fn unknown_routes_are_rejected() {
    let client = both_servers().await;

    for name in ["add", "nobody_add", "my_server_"] {
        let err = client.call_tool(name, json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownRoute(_)), "{name}: {err}");
    }

    let err = client
        .read_resource("resource://greeting")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnknownRoute(_)));
}

#[tokio::test]
async fn single_server_is_not_namespaced() {
    let mut clients = IndexMap::new();
    clients.insert(
        "my_server".to_string(),
        connect(basic::build_server(), ClientHandlers::new()).await,
    );
    let client = MultiClient::from_clients(clients);

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools[0].name, "add");
    let result = client.call_tool("add", json!({ "a": 2, "b": 2 })).await.unwrap();
    assert_eq!(result.first_text(), Some("4"));

    client.close().await.unwrap();
}
