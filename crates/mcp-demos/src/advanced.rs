//! The advanced demo server.
//!
//! Each tool shows one thing a tool can do through its request context:
//! - `process_file` receives the context as an argument
//! - `analyze_dataset` reaches it from a helper via [`Context::current`]
//! - `collect_user_info` asks the user for input (elicitation)
//! - `process_items` reports progress
//! - `analyze_sentiment` asks the client's model (sampling)

use std::fmt;
use std::time::Duration;

use mcp_protocol::{McpError, McpInputSchema, McpTool, ToolCallResult};
use mcp_server::{Context, Elicitable, Elicitation, FnTool, McpServer, NoArgs, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub const SERVER_NAME: &str = "MyAdvancedMCPServer";

/// Returned to clients in `initialize`
pub const INSTRUCTIONS: &str = "Some tools call back into the client while they run: \
    collect_user_info asks the user for a name and age, analyze_sentiment asks the \
    client's model for a one-word answer, and process_items reports progress.";

/// Knobs the tests turn down
#[derive(Debug, Clone)]
pub struct AdvancedOptions {
    /// Simulated work per item in `process_items`
    pub item_delay: Duration,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_secs(1),
        }
    }
}

/// What `collect_user_info` asks the user for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub age: i64,
}

impl Elicitable for UserInfo {
    fn requested_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "title": "Name" },
                "age": { "type": "integer", "title": "Age" }
            },
            "required": ["name", "age"]
        })
    }
}

/// Reply to the elicitation outcome
pub fn describe_user(outcome: Elicitation<UserInfo>) -> String {
    match outcome {
        Elicitation::Accept(user) => format!("Hello {}, you are {} years old", user.name, user.age),
        Elicitation::Decline => "Information not provided".to_string(),
        Elicitation::Cancel => "Operation cancelled".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Map a free-form model reply onto a label. "positive" wins over
    /// "negative" when both appear; anything else is neutral.
    pub fn classify(reply: &str) -> Self {
        let reply = reply.trim().to_lowercase();
        if reply.contains("positive") {
            Self::Positive
        } else if reply.contains("negative") {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classification request sent to the client's model
pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "Analyze the sentiment of the following text as positive, negative, or neutral. \n    \
         Just output a single word - 'positive', 'negative', or 'neutral'.\n    \n    \
         Text to analyze: {text}"
    )
}

#[derive(Debug, Deserialize)]
struct ProcessFileArgs {
    file_uri: String,
}

async fn process_file(args: ProcessFileArgs, ctx: Context) -> Result<ToolCallResult, ToolError> {
    debug!(file_uri = %args.file_uri, request = %ctx.request_id(), "processing file");
    Ok(ToolCallResult::text("Processed file"))
}

/// Log through whatever request is being served; it is not handed a context
async fn process_data(data: &[i64]) -> Result<(), McpError> {
    let ctx = Context::current()?;
    ctx.info(format!("Processing {} data points", data.len()))
        .await
}

#[derive(Debug, Deserialize)]
struct DatasetArgs {
    dataset_name: String,
}

async fn analyze_dataset(args: DatasetArgs, _ctx: Context) -> Result<ToolCallResult, ToolError> {
    debug!(dataset = %args.dataset_name, "analyzing dataset");
    let data: Vec<i64> = (1..=10).collect();
    process_data(&data).await?;

    Ok(ToolCallResult::structured(json!({
        "processed": data.len(),
        "results": data,
    })))
}

async fn collect_user_info(_args: NoArgs, ctx: Context) -> Result<ToolCallResult, ToolError> {
    let outcome = ctx
        .elicit::<UserInfo>("Please provide your information")
        .await?;
    Ok(ToolCallResult::text(describe_user(outcome)))
}

#[derive(Debug, Deserialize)]
struct ItemsArgs {
    items: Vec<String>,
}

async fn process_items(
    args: ItemsArgs,
    ctx: Context,
    delay: Duration,
) -> Result<ToolCallResult, ToolError> {
    let total = args.items.len() as f64;
    let mut results = Vec::with_capacity(args.items.len());

    for (i, item) in args.items.iter().enumerate() {
        ctx.report_progress(i as f64, Some(total), None).await?;
        tokio::time::sleep(delay).await;
        results.push(item.to_uppercase());
    }
    ctx.report_progress(total, Some(total), None).await?;

    Ok(ToolCallResult::structured(json!({
        "processed": results.len(),
        "results": results,
    })))
}

#[derive(Debug, Deserialize)]
struct SentimentArgs {
    text: String,
}

async fn analyze_sentiment(args: SentimentArgs, ctx: Context) -> Result<ToolCallResult, ToolError> {
    let response = ctx.sample(sentiment_prompt(&args.text)).await?;
    let reply = response.text().unwrap_or_default();
    let sentiment = Sentiment::classify(reply);
    debug!(%sentiment, "sentiment classified");

    Ok(ToolCallResult::structured(json!({
        "text": args.text,
        "sentiment": sentiment,
    })))
}

/// Build the advanced demo server
pub fn build_server(options: AdvancedOptions) -> McpServer {
    let delay = options.item_delay;

    McpServer::builder(SERVER_NAME)
        .instructions(INSTRUCTIONS)
        .tool(
            McpTool::new(
                "process_file",
                "Processes a file, using context for logging and resource access.",
                McpInputSchema::default()
                    .required_property("file_uri", json!({ "type": "string" })),
            ),
            FnTool::new(process_file),
        )
        .tool(
            McpTool::new(
                "analyze_dataset",
                "Analyze a dataset, logging progress through the request context.",
                McpInputSchema::default()
                    .required_property("dataset_name", json!({ "type": "string" })),
            ),
            FnTool::new(analyze_dataset),
        )
        .tool(
            McpTool::new(
                "collect_user_info",
                "Collect user information through interactive prompts.",
                McpInputSchema::default(),
            ),
            FnTool::new(collect_user_info),
        )
        .tool(
            McpTool::new(
                "process_items",
                "Process a list of items with progress updates.",
                McpInputSchema::default().required_property(
                    "items",
                    json!({ "type": "array", "items": { "type": "string" } }),
                ),
            ),
            FnTool::new(move |args: ItemsArgs, ctx: Context| process_items(args, ctx, delay)),
        )
        .tool(
            McpTool::new(
                "analyze_sentiment",
                "Analyze the sentiment of text using the client's LLM.",
                McpInputSchema::default().required_property("text", json!({ "type": "string" })),
            ),
            FnTool::new(analyze_sentiment),
        )
        .build()
}
