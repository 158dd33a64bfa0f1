//! The basic demo server: one tool, a greeting resource and its template,
//! and two prompts.

use std::collections::HashMap;

use mcp_protocol::{
    McpError, McpInputSchema, McpPrompt, McpResource, McpResourceTemplate, McpTool, PromptMessage,
    ToolCallResult,
};
use mcp_server::{Context, FnPrompt, FnResource, FnTool, McpServer, ToolError};
use serde::Deserialize;
use serde_json::json;

pub const SERVER_NAME: &str = "MyMCPServer";

#[derive(Debug, Deserialize)]
pub struct AddArgs {
    pub a: i64,
    pub b: i64,
}

async fn add(args: AddArgs, _ctx: Context) -> Result<ToolCallResult, ToolError> {
    let sum = args
        .a
        .checked_add(args.b)
        .ok_or_else(|| ToolError::failed(format!("{} + {} overflows", args.a, args.b)))?;
    Ok(ToolCallResult::structured(json!(sum)))
}

async fn greeting(_params: HashMap<String, String>) -> Result<String, McpError> {
    Ok("Hello from FastMCP Resources!".to_string())
}

async fn greeting_by_name(params: HashMap<String, String>) -> Result<String, McpError> {
    let name = params
        .get("name")
        .ok_or_else(|| McpError::invalid_params("Missing name in resource URI"))?;
    Ok(format!("Hello {name} from FastMCP Resources!"))
}

#[derive(Debug, Deserialize)]
struct TopicArgs {
    topic: String,
}

async fn ask_about_topic(args: TopicArgs) -> Result<String, McpError> {
    Ok(format!(
        "Can you please explain the concept of '{}'?",
        args.topic
    ))
}

#[derive(Debug, Deserialize)]
struct CodeRequestArgs {
    language: String,
    task_description: String,
}

async fn generate_code_request(args: CodeRequestArgs) -> Result<PromptMessage, McpError> {
    Ok(PromptMessage::user(format!(
        "Write a {} function that performs the following task: {}",
        args.language, args.task_description
    )))
}

/// Build the basic demo server
pub fn build_server() -> McpServer {
    McpServer::builder(SERVER_NAME)
        .tool(
            McpTool::new(
                "add",
                "Add two numbers",
                McpInputSchema::default()
                    .required_property("a", json!({ "type": "integer" }))
                    .required_property("b", json!({ "type": "integer" })),
            ),
            FnTool::new(add),
        )
        .resource(
            McpResource::new("resource://greeting", "get_greeting")
                .with_description("Provide a simple greeting message."),
            FnResource::new(greeting),
        )
        .resource_template(
            McpResourceTemplate::new("data://{name}/greeting", "get_greeting_by_name")
                .with_description("Provide a personalized greeting."),
            FnResource::new(greeting_by_name),
        )
        .prompt(
            McpPrompt::new(
                "ask_about_topic",
                "Generates a user message asking for an explanation of a topic.",
            )
            .argument("topic", Some("The topic to explain"), true),
            FnPrompt::new(ask_about_topic),
        )
        .prompt(
            McpPrompt::new(
                "generate_code_request",
                "Generates a user message requesting code generation.",
            )
            .argument("language", Some("Programming language to write in"), true)
            .argument("task_description", Some("What the function should do"), true),
            FnPrompt::new(generate_code_request),
        )
        .build()
}
