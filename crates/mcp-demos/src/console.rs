//! Terminal side of the client demos: handlers that print what servers send
//! and ask the user when a server wants input.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use mcp_client::{
    ElicitationHandler, LoggingHandler, MultiClient, ProgressHandler, SamplingHandler,
};
use mcp_protocol::{
    CreateMessageParams, CreateMessageResult, ElicitParams, ElicitResult, LoggingMessageParams,
    McpError, ProgressParams,
};
use serde_json::{json, Value};
use tracing::debug;

/// Model name reported for the canned sampling reply
pub const CONSOLE_MODEL: &str = "console";

const RULE: &str = "===============================";

/// Banner printed before each listing or result
pub fn section(title: &str) -> String {
    format!("\n{RULE}{title}{RULE}\n")
}

/// Turn the user's raw answers into an elicitation result.
///
/// Either answer left empty declines, and so does an age that is not a
/// whole number.
pub fn answer_user_info(name: &str, age: &str) -> ElicitResult {
    let (name, age) = (name.trim(), age.trim());
    if name.is_empty() || age.is_empty() {
        return ElicitResult::decline();
    }
    match age.parse::<i64>() {
        Ok(age) => ElicitResult::accept(json!({ "name": name, "age": age })),
        Err(_) => {
            debug!(%age, "age is not a number, declining");
            ElicitResult::decline()
        }
    }
}

pub fn format_progress(progress: f64, total: Option<f64>, message: Option<&str>) -> String {
    let message = message.unwrap_or_default();
    match total {
        Some(total) if total > 0.0 => {
            format!("Progress: {:.1}% - {message}", progress / total * 100.0)
        }
        _ => format!("Progress: {progress} - {message}"),
    }
}

fn prompt_line(label: &str) -> io::Result<String> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{label}")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Asks for a name and an age on the terminal
pub struct ConsoleElicitation;

#[async_trait]
impl ElicitationHandler for ConsoleElicitation {
    async fn elicit(&self, params: ElicitParams) -> Result<ElicitResult, McpError> {
        println!("{}", params.message);

        let answers = tokio::task::spawn_blocking(|| -> io::Result<(String, String)> {
            let name = prompt_line("Enter name: ")?;
            let age = prompt_line("Enter age: ")?;
            Ok((name, age))
        })
        .await
        .map_err(|e| McpError::internal_error(format!("Input task failed: {e}")))?
        .map_err(|e| McpError::internal_error(format!("Failed to read input: {e}")))?;

        Ok(answer_user_info(&answers.0, &answers.1))
    }
}

/// Prints server log messages
pub struct ConsoleLogging;

#[async_trait]
impl LoggingHandler for ConsoleLogging {
    async fn on_log(&self, params: LoggingMessageParams) {
        let msg = match params.data.get("msg") {
            Some(Value::String(msg)) => msg.clone(),
            Some(other) => other.to_string(),
            None => params.data.to_string(),
        };
        let extra = params.data.get("extra").cloned().unwrap_or(Value::Null);

        println!("======Log Data from handler======");
        println!("{msg}");
        println!("{extra}");
        println!("{}", params.level);
        println!("=================================");
    }
}

/// Prints progress updates
pub struct ConsoleProgress;

#[async_trait]
impl ProgressHandler for ConsoleProgress {
    async fn on_progress(&self, params: ProgressParams) {
        println!(
            "{}",
            format_progress(params.progress, params.total, params.message.as_deref())
        );
    }
}

/// Stands in for a language model: shows the request and answers "neutral"
pub struct ConsoleSampling;

#[async_trait]
impl SamplingHandler for ConsoleSampling {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, McpError> {
        let first = params
            .messages
            .first()
            .and_then(|m| m.content.as_text())
            .unwrap_or_default();

        println!("======Sampling Data from handler======");
        println!("{first}");
        println!("=================================");

        Ok(CreateMessageResult::assistant_text(CONSOLE_MODEL, "neutral"))
    }
}

/// Print the names of everything the connected servers offer
pub async fn print_catalog(client: &MultiClient) -> mcp_client::Result<()> {
    let tools = client.list_tools().await?;
    let resources = client.list_resources().await?;
    let templates = client.list_resource_templates().await?;
    let prompts = client.list_prompts().await?;

    print_names("Tools", tools.iter().map(|t| t.name.as_str()));
    print_names("Resources", resources.iter().map(|r| r.name.as_str()));
    print_names(
        "Resource Templates",
        templates.iter().map(|t| t.name.as_str()),
    );
    print_names("Prompts", prompts.iter().map(|p| p.name.as_str()));
    Ok(())
}

fn print_names<'a>(title: &str, names: impl Iterator<Item = &'a str>) {
    println!("{}", section(title));
    println!("{}", names.collect::<Vec<_>>().join("\n"));
}
