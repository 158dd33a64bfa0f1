//! Tool registration and dispatch

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use mcp_protocol::{McpTool, ToolCallResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::ToolError;

/// Something that can serve `tools/call`
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value, ctx: Context) -> Result<ToolCallResult, ToolError>;
}

/// Arguments of a tool that takes none
#[derive(Debug, Default, Deserialize)]
pub struct NoArgs {}

/// Adapts an async function taking typed arguments into a [`ToolHandler`]
pub struct FnTool<A, F> {
    f: F,
    _args: PhantomData<fn() -> A>,
}

impl<A, F, Fut> FnTool<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolCallResult, ToolError>> + Send + 'static,
{
    pub fn new(f: F) -> Arc<dyn ToolHandler> {
        Arc::new(Self {
            f,
            _args: PhantomData,
        })
    }
}

#[async_trait]
impl<A, F, Fut> ToolHandler for FnTool<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolCallResult, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: Value, ctx: Context) -> Result<ToolCallResult, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let args: A = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        (self.f)(args, ctx).await
    }
}

struct RegisteredTool {
    definition: McpTool,
    handler: Arc<dyn ToolHandler>,
}

/// Tools in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name
    pub fn register(&mut self, definition: McpTool, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler,
            },
        );
    }

    pub fn definitions(&self) -> Vec<McpTool> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|t| t.handler.clone())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
