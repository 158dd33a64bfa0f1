//! Talks to both demo servers at once through namespaced names and handles
//! everything the advanced server sends back: log messages, progress,
//! elicitation and sampling requests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use serde_json::{json, Value};

use mcp_client::{ClientHandlers, MultiClient};
use mcp_demos::console::{
    print_catalog, section, ConsoleElicitation, ConsoleLogging, ConsoleProgress, ConsoleSampling,
};
use mcp_demos::settings::{init_logging, load_client_config};

#[derive(Parser, Debug)]
#[command(name = "multiserver-client", version)]
#[command(about = "Exercise both MCP demo servers through one client")]
struct Cli {
    /// `mcpServers` JSON config [default: the user config file, else both
    /// demo servers on their default addresses]
    #[arg(long)]
    config: Option<PathBuf>,
}

async fn show_tool(
    client: &MultiClient,
    title: &str,
    name: &str,
    arguments: Value,
) -> anyhow::Result<()> {
    println!("{}", section(title));
    let result = client
        .call_tool(name, arguments)
        .await
        .with_context(|| format!("Calling {name} failed"))?;
    println!("{}", result.first_text().unwrap_or_default());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = load_client_config(cli.config.as_deref())?;
    let handlers = ClientHandlers::new()
        .with_elicitation(Arc::new(ConsoleElicitation))
        .with_logging(Arc::new(ConsoleLogging))
        .with_progress(Arc::new(ConsoleProgress))
        .with_sampling(Arc::new(ConsoleSampling));

    let client = MultiClient::connect(&config, handlers)
        .await
        .context("Failed to connect to the configured servers")?;

    client.ping().await?;
    print_catalog(&client).await?;

    let result = client
        .call_tool("my_server_add", json!({ "a": 1, "b": 2 }))
        .await?;
    println!("{}", section("Tool Result"));
    println!("{}", result.first_text().unwrap_or_default());

    let contents = client.read_resource("resource://my_server/greeting").await?;
    println!("{}", section("Resource Result"));
    println!(
        "{}",
        contents
            .first()
            .and_then(|c| c.text.as_deref())
            .unwrap_or_default()
    );

    let prompt = client
        .get_prompt(
            "my_server_ask_about_topic",
            HashMap::from([("topic".to_string(), "AI".to_string())]),
        )
        .await?;
    println!("{}", section("Prompt Result"));
    println!(
        "{}",
        prompt
            .messages
            .first()
            .and_then(|m| m.content.as_text())
            .unwrap_or_default()
    );

    show_tool(
        &client,
        "Advanced Server Tool with context Result",
        "my_advanced_server_process_file",
        json!({ "file_uri": "file://test.txt" }),
    )
    .await?;
    show_tool(
        &client,
        "Advanced Server Tool with elicitation Result",
        "my_advanced_server_collect_user_info",
        json!({}),
    )
    .await?;
    show_tool(
        &client,
        "Advanced Server Tool with logging Result",
        "my_advanced_server_analyze_dataset",
        json!({ "dataset_name": "test.txt" }),
    )
    .await?;
    show_tool(
        &client,
        "Advanced Server Tool with progress reporting Result",
        "my_advanced_server_process_items",
        json!({ "items": ["item1", "item2", "item3"] }),
    )
    .await?;
    show_tool(
        &client,
        "Advanced Server Tool with LLM sampling Result",
        "my_advanced_server_analyze_sentiment",
        json!({ "text": "AI is the future of technology" }),
    )
    .await?;

    client.close().await?;
    Ok(())
}
