//! Static resources and resource templates

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use mcp_protocol::{McpError, McpResource, McpResourceTemplate, ResourceContents};
use tracing::debug;

use crate::uri_template::UriTemplate;

/// Produces the contents of a resource.
///
/// `params` holds the variables captured from a template URI and is empty
/// for static resources.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(
        &self,
        uri: &str,
        params: HashMap<String, String>,
    ) -> Result<Vec<ResourceContents>, McpError>;
}

/// Adapts an async function returning text into a [`ResourceHandler`]
pub struct FnResource<F> {
    f: F,
}

impl<F, Fut> FnResource<F>
where
    F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, McpError>> + Send + 'static,
{
    pub fn new(f: F) -> Arc<dyn ResourceHandler> {
        Arc::new(Self { f })
    }
}

#[async_trait]
impl<F, Fut> ResourceHandler for FnResource<F>
where
    F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, McpError>> + Send + 'static,
{
    async fn read(
        &self,
        uri: &str,
        params: HashMap<String, String>,
    ) -> Result<Vec<ResourceContents>, McpError> {
        let text = (self.f)(params).await?;
        Ok(vec![ResourceContents::text(uri, text)])
    }
}

struct RegisteredResource {
    definition: McpResource,
    handler: Arc<dyn ResourceHandler>,
}

struct RegisteredTemplate {
    definition: McpResourceTemplate,
    template: UriTemplate,
    handler: Arc<dyn ResourceHandler>,
}

/// Resources keyed by URI plus templates tried in registration order
#[derive(Default)]
pub struct ResourceRegistry {
    resources: IndexMap<String, RegisteredResource>,
    templates: Vec<RegisteredTemplate>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: McpResource, handler: Arc<dyn ResourceHandler>) {
        self.resources.insert(
            definition.uri.clone(),
            RegisteredResource {
                definition,
                handler,
            },
        );
    }

    pub fn register_template(
        &mut self,
        definition: McpResourceTemplate,
        handler: Arc<dyn ResourceHandler>,
    ) {
        let template = UriTemplate::parse(&definition.uri_template);
        self.templates.push(RegisteredTemplate {
            definition,
            template,
            handler,
        });
    }

    pub fn resources(&self) -> Vec<McpResource> {
        self.resources
            .values()
            .map(|r| r.definition.clone())
            .collect()
    }

    pub fn templates(&self) -> Vec<McpResourceTemplate> {
        self.templates
            .iter()
            .map(|t| t.definition.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.templates.is_empty()
    }

    /// Read a URI. Exact resources win over templates.
    pub async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>, McpError> {
        if let Some(resource) = self.resources.get(uri) {
            return resource.handler.read(uri, HashMap::new()).await;
        }

        for entry in &self.templates {
            if let Some(params) = entry.template.matches(uri) {
                debug!(%uri, template = %entry.template.as_str(), "resource template matched");
                return entry.handler.read(uri, params).await;
            }
        }

        Err(McpError::resource_not_found(uri))
    }
}
