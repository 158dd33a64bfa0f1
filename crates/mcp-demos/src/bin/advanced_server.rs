//! Advanced demo server: context access, logging, elicitation, progress and
//! sampling. Serves streamable HTTP on 127.0.0.1:8000 by default.

use std::time::Duration;

use clap::Parser;

use mcp_demos::advanced::{self, AdvancedOptions};
use mcp_demos::settings::{init_logging, ServeArgs, TransportKind};

#[derive(Parser, Debug)]
#[command(name = "advanced-server", version)]
#[command(about = "Advanced MCP demo server")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,

    /// Milliseconds `process_items` spends on each item
    #[arg(long, default_value_t = 1000)]
    item_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let options = AdvancedOptions {
        item_delay: Duration::from_millis(cli.item_delay_ms),
    };
    advanced::build_server(options)
        .run(cli.serve.mode(TransportKind::Http))
        .await?;
    Ok(())
}
