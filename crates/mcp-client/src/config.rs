//! `mcpServers` configuration

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};

/// A set of named servers, in the order they were declared
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: IndexMap<String, ServerEntry>,
}

impl ClientConfig {
    /// Config holding a single server
    pub fn single(name: impl Into<String>, entry: ServerEntry) -> Self {
        let mut mcp_servers = IndexMap::new();
        mcp_servers.insert(name.into(), entry);
        Self { mcp_servers }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))?;
        if config.mcp_servers.is_empty() {
            return Err(ClientError::Config("no servers in mcpServers".into()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading client config");
        let json = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// `<config dir>/mcp-demos/mcp.json`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "mcp-demos", "mcp-demos")
            .map(|dirs| dirs.config_dir().join("mcp.json"))
    }
}

/// How to reach one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerEntry {
    /// Streamable HTTP endpoint
    Http {
        url: Url,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transport: Option<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        headers: IndexMap<String, String>,
    },
    /// Child process speaking MCP on stdin/stdout
    Stdio {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        env: IndexMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
    },
}

impl ServerEntry {
    /// Interpret a command-line target: URLs are HTTP servers, anything else
    /// is a command to launch.
    pub fn infer(target: &str) -> Result<Self> {
        let target = target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            let url = Url::parse(target).map_err(|e| ClientError::Config(format!("{target}: {e}")))?;
            return Ok(Self::http(url));
        }

        let mut words = target.split_whitespace().map(str::to_string);
        let command = words
            .next()
            .ok_or_else(|| ClientError::Config("empty server target".into()))?;
        Ok(Self::Stdio {
            command,
            args: words.collect(),
            env: IndexMap::new(),
            cwd: None,
        })
    }

    pub fn http(url: Url) -> Self {
        Self::Http {
            url,
            transport: None,
            headers: IndexMap::new(),
        }
    }

    /// Launch `command` with no arguments
    pub fn stdio(command: impl Into<String>) -> Self {
        Self::Stdio {
            command: command.into(),
            args: Vec::new(),
            env: IndexMap::new(),
            cwd: None,
        }
    }

    /// Add an environment variable; no effect on HTTP entries
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Stdio { env, .. } = &mut self {
            env.insert(key.into(), value.into());
        }
        self
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Http { url, .. } => url.to_string(),
            Self::Stdio { command, args, .. } if args.is_empty() => command.clone(),
            Self::Stdio { command, args, .. } => format!("{command} {}", args.join(" ")),
        }
    }
}
