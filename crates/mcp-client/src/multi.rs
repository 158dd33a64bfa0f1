//! Several servers behind one client.
//!
//! With more than one server connected, names are namespaced by server:
//! tools and prompts become `{server}_{name}` and resource URIs become
//! `scheme://{server}/{rest}`. A single server is exposed unchanged.

use std::collections::HashMap;

use futures::future::try_join_all;
use indexmap::IndexMap;
use mcp_protocol::{
    GetPromptResult, LoggingLevel, McpPrompt, McpResource, McpResourceTemplate, McpTool,
    ResourceContents, ToolCallResult,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::handlers::ClientHandlers;

/// `{server}_{name}`
pub fn prefix_name(server: &str, name: &str) -> String {
    format!("{server}_{name}")
}

/// `scheme://rest` becomes `scheme://{server}/rest`
pub fn prefix_uri(server: &str, uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, rest)) => format!("{scheme}://{server}/{rest}"),
        None => format!("{server}/{uri}"),
    }
}

/// Clients keyed by server name, in configuration order
pub struct MultiClient {
    clients: IndexMap<String, Client>,
}

impl MultiClient {
    /// Connect to every configured server concurrently.
    ///
    /// Fails if any server fails; the error names the server.
    pub async fn connect(config: &ClientConfig, handlers: ClientHandlers) -> Result<Self> {
        if config.mcp_servers.is_empty() {
            return Err(ClientError::Config("no servers configured".into()));
        }

        let connections = config.mcp_servers.iter().map(|(name, entry)| {
            let handlers = handlers.clone();
            async move {
                debug!(server = %name, target = %entry.describe(), "connecting");
                Client::connect(entry, handlers)
                    .await
                    .map(|client| (name.clone(), client))
                    .map_err(|e| ClientError::for_server(name.as_str(), e))
            }
        });

        let clients: IndexMap<_, _> = try_join_all(connections).await?.into_iter().collect();
        info!(servers = clients.len(), "Connected to all MCP servers");
        Ok(Self { clients })
    }

    pub fn from_clients(clients: IndexMap<String, Client>) -> Self {
        Self { clients }
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn client(&self, server: &str) -> Option<&Client> {
        self.clients.get(server)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn namespaced(&self) -> bool {
        self.clients.len() > 1
    }

    pub async fn ping(&self) -> Result<()> {
        for (name, client) in &self.clients {
            client
                .ping()
                .await
                .map_err(|e| ClientError::for_server(name.as_str(), e))?;
        }
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        for (server, client) in &self.clients {
            for mut tool in client
                .list_tools()
                .await
                .map_err(|e| ClientError::for_server(server.as_str(), e))?
            {
                if self.namespaced() {
                    tool.name = prefix_name(server, &tool.name);
                }
                tools.push(tool);
            }
        }
        Ok(tools)
    }

    pub async fn list_resources(&self) -> Result<Vec<McpResource>> {
        let mut resources = Vec::new();
        for (server, client) in &self.clients {
            for mut resource in client
                .list_resources()
                .await
                .map_err(|e| ClientError::for_server(server.as_str(), e))?
            {
                if self.namespaced() {
                    resource.uri = prefix_uri(server, &resource.uri);
                    resource.name = prefix_name(server, &resource.name);
                }
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<McpResourceTemplate>> {
        let mut templates = Vec::new();
        for (server, client) in &self.clients {
            for mut template in client
                .list_resource_templates()
                .await
                .map_err(|e| ClientError::for_server(server.as_str(), e))?
            {
                if self.namespaced() {
                    template.uri_template = prefix_uri(server, &template.uri_template);
                    template.name = prefix_name(server, &template.name);
                }
                templates.push(template);
            }
        }
        Ok(templates)
    }

    pub async fn list_prompts(&self) -> Result<Vec<McpPrompt>> {
        let mut prompts = Vec::new();
        for (server, client) in &self.clients {
            for mut prompt in client
                .list_prompts()
                .await
                .map_err(|e| ClientError::for_server(server.as_str(), e))?
            {
                if self.namespaced() {
                    prompt.name = prefix_name(server, &prompt.name);
                }
                prompts.push(prompt);
            }
        }
        Ok(prompts)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let (client, tool) = self.route_name(name)?;
        client.call_tool(tool, arguments).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let (client, uri) = self.route_uri(uri)?;
        client.read_resource(&uri).await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult> {
        let (client, prompt) = self.route_name(name)?;
        client.get_prompt(prompt, arguments).await
    }

    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<()> {
        for (name, client) in &self.clients {
            client
                .set_logging_level(level)
                .await
                .map_err(|e| ClientError::for_server(name.as_str(), e))?;
        }
        Ok(())
    }

    /// Close every connection, reporting the first failure
    pub async fn close(self) -> Result<()> {
        let mut first_error = None;
        for (name, client) in self.clients {
            if let Err(e) = client.close().await {
                first_error.get_or_insert(ClientError::for_server(name, e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Find the server of a namespaced tool or prompt name.
    ///
    /// The longest matching server name wins, so `a_b` beats `a` for
    /// `a_b_tool`.
    fn route_name<'a>(&self, name: &'a str) -> Result<(&Client, &'a str)> {
        if !self.namespaced() {
            let client = self
                .clients
                .values()
                .next()
                .ok_or_else(|| ClientError::UnknownRoute(name.to_string()))?;
            return Ok((client, name));
        }

        self.clients
            .iter()
            .filter_map(|(server, client)| {
                name.strip_prefix(server.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (server.len(), client, rest))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, client, rest)| (client, rest))
            .ok_or_else(|| ClientError::UnknownRoute(name.to_string()))
    }

    /// Find the server of a namespaced URI and restore the original URI
    fn route_uri(&self, uri: &str) -> Result<(&Client, String)> {
        if !self.namespaced() {
            let client = self
                .clients
                .values()
                .next()
                .ok_or_else(|| ClientError::UnknownRoute(uri.to_string()))?;
            return Ok((client, uri.to_string()));
        }

        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, uri),
        };
        let (server, original) = rest
            .split_once('/')
            .ok_or_else(|| ClientError::UnknownRoute(uri.to_string()))?;
        let client = self
            .clients
            .get(server)
            .ok_or_else(|| ClientError::UnknownRoute(uri.to_string()))?;

        let original = match scheme {
            Some(scheme) => format!("{scheme}://{original}"),
            None => original.to_string(),
        };
        Ok((client, original))
    }
}
