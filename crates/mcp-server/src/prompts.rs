//! Prompt templates

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use mcp_protocol::{GetPromptResult, McpError, McpPrompt, PromptMessage};
use serde::de::DeserializeOwned;

/// Renders a prompt from its string arguments
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(&self, arguments: HashMap<String, String>)
        -> Result<Vec<PromptMessage>, McpError>;
}

/// What a prompt function may return
#[derive(Debug, Clone)]
pub enum PromptReply {
    /// A single user message
    Text(String),
    Message(PromptMessage),
    Messages(Vec<PromptMessage>),
}

impl PromptReply {
    pub fn into_messages(self) -> Vec<PromptMessage> {
        match self {
            Self::Text(text) => vec![PromptMessage::user(text)],
            Self::Message(message) => vec![message],
            Self::Messages(messages) => messages,
        }
    }
}

impl From<String> for PromptReply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<PromptMessage> for PromptReply {
    fn from(message: PromptMessage) -> Self {
        Self::Message(message)
    }
}

impl From<Vec<PromptMessage>> for PromptReply {
    fn from(messages: Vec<PromptMessage>) -> Self {
        Self::Messages(messages)
    }
}

/// Adapts an async function taking typed arguments into a [`PromptHandler`]
pub struct FnPrompt<A, F> {
    f: F,
    _args: PhantomData<fn() -> A>,
}

impl<A, F, Fut, R> FnPrompt<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, McpError>> + Send + 'static,
    R: Into<PromptReply> + 'static,
{
    pub fn new(f: F) -> Arc<dyn PromptHandler> {
        Arc::new(Self {
            f,
            _args: PhantomData,
        })
    }
}

#[async_trait]
impl<A, F, Fut, R> PromptHandler for FnPrompt<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, McpError>> + Send + 'static,
    R: Into<PromptReply> + 'static,
{
    async fn render(
        &self,
        arguments: HashMap<String, String>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let value = serde_json::to_value(arguments)?;
        let args: A = serde_json::from_value(value)
            .map_err(|e| McpError::invalid_params(format!("Invalid prompt arguments: {e}")))?;
        let reply = (self.f)(args).await?;
        Ok(reply.into().into_messages())
    }
}

struct RegisteredPrompt {
    definition: McpPrompt,
    handler: Arc<dyn PromptHandler>,
}

/// Prompts in registration order
#[derive(Default)]
pub struct PromptRegistry {
    prompts: IndexMap<String, RegisteredPrompt>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: McpPrompt, handler: Arc<dyn PromptHandler>) {
        self.prompts.insert(
            definition.name.clone(),
            RegisteredPrompt {
                definition,
                handler,
            },
        );
    }

    pub fn definitions(&self) -> Vec<McpPrompt> {
        self.prompts
            .values()
            .map(|p| p.definition.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Render a prompt after checking its required arguments
    pub async fn get(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult, McpError> {
        let prompt = self
            .prompts
            .get(name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown prompt: {name}")))?;

        if let Some(missing) = prompt
            .definition
            .arguments
            .iter()
            .find(|arg| arg.required && !arguments.contains_key(&arg.name))
        {
            return Err(McpError::invalid_params(format!(
                "Missing required argument: {}",
                missing.name
            )));
        }

        let messages = prompt.handler.render(arguments).await?;
        Ok(GetPromptResult {
            description: prompt.definition.description.clone(),
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::Role;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct TopicArgs {
        topic: String,
    }

    async fn explain(args: TopicArgs) -> Result<String, McpError> {
        Ok(format!("Explain {}", args.topic))
    }

    async fn dialogue(_args: TopicArgs) -> Result<Vec<PromptMessage>, McpError> {
        Ok(vec![
            PromptMessage::user("hi"),
            PromptMessage::assistant("hello"),
        ])
    }

    fn registry() -> PromptRegistry {
        let mut registry = PromptRegistry::new();
        registry.register(
            McpPrompt::new("explain", "Explain a topic").argument("topic", None, true),
            FnPrompt::new(explain),
        );
        registry.register(
            McpPrompt::new("dialogue", "Two turns").argument("topic", None, false),
            FnPrompt::new(dialogue),
        );
        registry
    }

    #[tokio::test]
    async fn test_renders_text_as_user_message() {
        let args = HashMap::from([("topic".to_string(), "ownership".to_string())]);
        let result = registry().get("explain", args).await.unwrap();

        assert_eq!(result.description.as_deref(), Some("Explain a topic"));
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, Role::User);
        assert_eq!(result.messages[0].content.as_text(), Some("Explain ownership"));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let err = registry().get("explain", HashMap::new()).await.unwrap_err();
        assert_eq!(err.code, McpError::INVALID_PARAMS);
        assert!(err.message.contains("topic"));
    }

    #[tokio::test]
    async fn test_unknown_prompt() {
        let err = registry().get("nope", HashMap::new()).await.unwrap_err();
        assert_eq!(err.code, McpError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_message_list_passes_through() {
        let args = HashMap::from([("topic".to_string(), "x".to_string())]);
        let result = registry().get("dialogue", args).await.unwrap();
        assert_eq!(result.messages[1].role, Role::Assistant);
    }
}
