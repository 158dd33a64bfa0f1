//! Both demo servers driven by a real client over an in-memory stdio pipe

use std::collections::HashMap;

use mcp_client::ClientHandlers;
use mcp_demos::basic;
use mcp_protocol::{ElicitResult, LoggingLevel, McpError};
use serde_json::json;

use super::common::{advanced_server, connect, Recorder};

#[tokio::test]
async fn basic_server_round_trip() {
    let client = connect(basic::build_server(), ClientHandlers::new()).await;
    assert_eq!(client.server_info().name, basic::SERVER_NAME);
    client.ping().await.unwrap();

    let tools: Vec<_> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tools, vec!["add"]);

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources[0].name, "get_greeting");
    let templates = client.list_resource_templates().await.unwrap();
    assert_eq!(templates[0].uri_template, "data://{name}/greeting");
    let prompts: Vec<_> = client
        .list_prompts()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(prompts, vec!["ask_about_topic", "generate_code_request"]);

    let result = client.call_tool("add", json!({ "a": 1, "b": 2 })).await.unwrap();
    assert_eq!(result.first_text(), Some("3"));

    let contents = client.read_resource("resource://greeting").await.unwrap();
    assert_eq!(contents[0].text.as_deref(), Some("Hello from FastMCP Resources!"));
    let contents = client.read_resource("data://alice/greeting").await.unwrap();
    assert_eq!(
        contents[0].text.as_deref(),
        Some("Hello alice from FastMCP Resources!")
    );

    let prompt = client
        .get_prompt(
            "ask_about_topic",
            HashMap::from([("topic".to_string(), "AI".to_string())]),
        )
        .await
        .unwrap();
    assert_eq!(
        prompt.messages[0].content.as_text(),
        Some("Can you please explain the concept of 'AI'?")
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn protocol_errors_surface_to_the_caller() {
    let client = connect(basic::build_server(), ClientHandlers::new()).await;

    let err = client
        .read_resource("data://a/b/greeting")
        .await
        .unwrap_err();
    assert_eq!(
        err.protocol_error().unwrap().code,
        McpError::RESOURCE_NOT_FOUND
    );

    let err = client
        .get_prompt("ask_about_topic", HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.protocol_error().unwrap().code, McpError::INVALID_PARAMS);

    let err = client.call_tool("subtract", json!({})).await.unwrap_err();
    assert_eq!(err.protocol_error().unwrap().code, McpError::INVALID_PARAMS);
}

#[tokio::test]
async fn elicitation_outcomes() {
    let cases = [
        (
            ElicitResult::accept(json!({ "name": "Ada", "age": 36 })),
            "Hello Ada, you are 36 years old",
        ),
        (ElicitResult::decline(), "Information not provided"),
        (ElicitResult::cancel(), "Operation cancelled"),
    ];

    for (answer, expected) in cases {
        let recorder = Recorder::new(answer, "neutral");
        let client = connect(advanced_server(), recorder.handlers()).await;

        let result = client
            .call_tool("collect_user_info", json!({}))
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some(expected));

        let elicited = recorder.elicited.lock().unwrap();
        assert_eq!(elicited[0].message, "Please provide your information");
        assert_eq!(elicited[0].requested_schema["required"], json!(["name", "age"]));
    }
}

#[tokio::test]
async fn sampling_drives_sentiment() {
    for (reply, expected) in [
        ("Positive", "positive"),
        ("  negative. ", "negative"),
        ("I am not sure", "neutral"),
    ] {
        let recorder = Recorder::new(ElicitResult::decline(), reply);
        let client = connect(advanced_server(), recorder.handlers()).await;

        let result = client
            .call_tool(
                "analyze_sentiment",
                json!({ "text": "AI is the future of technology" }),
            )
            .await
            .unwrap();
        assert_eq!(
            result.structured_content,
            Some(json!({ "text": "AI is the future of technology", "sentiment": expected }))
        );

        let sampled = recorder.sampled.lock().unwrap();
        let prompt = sampled[0].messages[0].content.as_text().unwrap();
        assert!(prompt.ends_with("Text to analyze: AI is the future of technology"));
    }
}

#[tokio::test]
async fn progress_and_logs_reach_the_client() {
    let recorder = Recorder::new(ElicitResult::decline(), "neutral");
    let client = connect(advanced_server(), recorder.handlers()).await;

    let result = client
        .call_tool("process_items", json!({ "items": ["item1", "item2", "item3"] }))
        .await
        .unwrap();
    assert_eq!(
        result.structured_content,
        Some(json!({ "processed": 3, "results": ["ITEM1", "ITEM2", "ITEM3"] }))
    );
    assert_eq!(
        *recorder.progress.lock().unwrap(),
        vec![
            (0.0, Some(3.0)),
            (1.0, Some(3.0)),
            (2.0, Some(3.0)),
            (3.0, Some(3.0))
        ]
    );

    client
        .call_tool("analyze_dataset", json!({ "dataset_name": "test.txt" }))
        .await
        .unwrap();
    {
        let logs = recorder.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LoggingLevel::Info);
        assert_eq!(logs[0].data["msg"], "Processing 10 data points");
    }

    client.set_logging_level(LoggingLevel::Warning).await.unwrap();
    client
        .call_tool("analyze_dataset", json!({ "dataset_name": "test.txt" }))
        .await
        .unwrap();
    assert_eq!(recorder.logs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn interactive_tools_fail_without_handlers() {
    let client = connect(advanced_server(), ClientHandlers::new()).await;

    let result = client
        .call_tool("collect_user_info", json!({}))
        .await
        .unwrap();
    assert!(result.is_error());
}
