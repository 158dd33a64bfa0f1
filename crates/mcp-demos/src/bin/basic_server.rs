//! Basic demo server: `add`, greetings and two prompts. Serves stdio by default.

use clap::Parser;

use mcp_demos::basic;
use mcp_demos::settings::{init_logging, ServeArgs, TransportKind};

#[derive(Parser, Debug)]
#[command(name = "basic-server", version)]
#[command(about = "Basic MCP demo server")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    basic::build_server()
        .run(cli.serve.mode(TransportKind::Stdio))
        .await?;
    Ok(())
}
