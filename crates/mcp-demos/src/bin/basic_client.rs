//! Talks to the basic demo server: ping, list everything, then call `add`,
//! read the greeting and render a prompt.

use std::collections::HashMap;

use anyhow::Context as _;
use clap::Parser;
use serde_json::json;

use mcp_client::{ClientConfig, ClientHandlers, MultiClient, ServerEntry};
use mcp_demos::console::{print_catalog, section};
use mcp_demos::settings::{init_logging, sibling_binary};

#[derive(Parser, Debug)]
#[command(name = "basic-client", version)]
#[command(about = "Exercise the basic MCP demo server")]
struct Cli {
    /// Server to talk to: an http(s) URL or a command line.
    /// Defaults to launching basic-server next to this binary.
    #[arg(long)]
    target: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let entry = match cli.target {
        Some(target) => ServerEntry::infer(&target)?,
        None => ServerEntry::stdio(sibling_binary("basic-server").to_string_lossy()),
    };
    let config = ClientConfig::single("basic", entry);
    let client = MultiClient::connect(&config, ClientHandlers::new())
        .await
        .context("Failed to connect to the basic server")?;

    client.ping().await?;
    print_catalog(&client).await?;

    let result = client.call_tool("add", json!({ "a": 1, "b": 2 })).await?;
    println!("{}", section("Tool Result"));
    println!("{}", result.first_text().unwrap_or_default());

    let contents = client.read_resource("resource://greeting").await?;
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
            "ask_about_topic",
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

    client.close().await?;
    Ok(())
}
