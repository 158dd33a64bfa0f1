//! Command line, environment and logging setup shared by the binaries

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use mcp_client::{ClientConfig, ServerEntry};
use mcp_server::ServerMode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Where the advanced server listens unless told otherwise
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8000;

/// Install the global tracing subscriber.
///
/// Output goes to stderr so it never mixes with protocol traffic on stdout.
/// The filter comes from `RUST_LOG`, else `LOG_LEVEL`, else `info`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            std::env::var("RUST_LOG").ok(),
            std::env::var("LOG_LEVEL").ok(),
        ))
        .with_writer(std::io::stderr)
        .init();
}

fn log_filter(rust_log: Option<String>, log_level: Option<String>) -> EnvFilter {
    rust_log
        .or_else(|| log_level.map(|level| level.to_lowercase()))
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Newline-delimited JSON on stdin/stdout
    Stdio,
    /// Streamable HTTP
    Http,
}

/// How a demo server should be served
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Transport to serve on [default depends on the server]
    #[arg(long, value_enum, env = "MCP_TRANSPORT")]
    pub transport: Option<TransportKind>,

    /// Address to listen on in HTTP mode
    #[arg(long, env = "MCP_HOST", default_value_t = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Port to listen on in HTTP mode
    #[arg(long, env = "MCP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ServeArgs {
    pub fn mode(&self, default: TransportKind) -> ServerMode {
        match self.transport.unwrap_or(default) {
            TransportKind::Stdio => ServerMode::Stdio,
            TransportKind::Http => ServerMode::Http {
                addr: SocketAddr::new(self.host, self.port),
            },
        }
    }
}

/// Path of another binary installed next to the running one.
///
/// Falls back to the bare name, which is then looked up on `PATH`.
pub fn sibling_binary(name: &str) -> PathBuf {
    let file = format!("{name}{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file)))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(file))
}

/// Both demo servers: the advanced one over HTTP, the basic one as a child
pub fn default_client_config() -> mcp_client::Result<ClientConfig> {
    let mut config = ClientConfig::single(
        "my_advanced_server",
        ServerEntry::infer(&format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}/mcp"))?,
    );
    config.mcp_servers.insert(
        "my_server".to_string(),
        ServerEntry::stdio(sibling_binary("basic-server").to_string_lossy())
            .with_env("LOG_LEVEL", "INFO"),
    );
    Ok(config)
}

/// Config from `path`, else the user's config file, else the built-in one
pub fn load_client_config(path: Option<&Path>) -> mcp_client::Result<ClientConfig> {
    if let Some(path) = path {
        return ClientConfig::load(path);
    }
    if let Some(path) = ClientConfig::default_path().filter(|p| p.exists()) {
        return ClientConfig::load(&path);
    }
    debug!("no client config file, using the built-in servers");
    default_client_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn test_mode_uses_server_default() {
        let cli = Cli::try_parse_from(["server"]).unwrap();
        assert_eq!(cli.serve.mode(TransportKind::Stdio), ServerMode::Stdio);
        assert_eq!(
            cli.serve.mode(TransportKind::Http),
            ServerMode::Http {
                addr: "127.0.0.1:8000".parse().unwrap()
            }
        );
    }

    #[test]
    fn test_mode_from_flags() {
        let cli = Cli::try_parse_from([
            "server",
            "--transport",
            "http",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
        ])
        .unwrap();
        assert_eq!(
            cli.serve.mode(TransportKind::Stdio),
            ServerMode::Http {
                addr: "0.0.0.0:9000".parse().unwrap()
            }
        );
    }

    #[test]
    fn test_log_filter_precedence() {
        use tracing_subscriber::filter::LevelFilter;

        let hint = |rust_log: Option<&str>, log_level: Option<&str>| {
            log_filter(rust_log.map(Into::into), log_level.map(Into::into)).max_level_hint()
        };
        assert_eq!(hint(Some("debug"), Some("ERROR")), Some(LevelFilter::DEBUG));
        assert_eq!(hint(None, Some("WARN")), Some(LevelFilter::WARN));
        assert_eq!(hint(None, None), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_default_config_has_both_servers() {
        let config = default_client_config().unwrap();
        let names: Vec<_> = config.mcp_servers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["my_advanced_server", "my_server"]);

        match &config.mcp_servers["my_server"] {
            ServerEntry::Stdio { command, env, .. } => {
                assert!(command.contains("basic-server"));
                assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("INFO"));
            }
            other => panic!("expected a stdio entry, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "mcpServers": {{ "only": {{ "url": "http://localhost:9000/mcp" }} }} }}"#
        )
        .unwrap();

        let config = load_client_config(Some(file.path())).unwrap();
        assert_eq!(config.mcp_servers.len(), 1);
        assert!(matches!(config.mcp_servers["only"], ServerEntry::Http { .. }));
    }
}
