use async_trait::async_trait;
use flowcore::{LlmError, LlmProvider, LlmResponse, Node, NodeContext, NodeError, NodeKind, Value};
use flowruntime::{ConfigField, NodeFactory, NodeMetadata};
use std::collections::BTreeMap;
use std::sync::Arc;

const PROMPT_PREVIEW_CHARS: usize = 200;

/// Calls the configured LLM provider once with the node's prompt
pub struct LlmNode {
    provider: Arc<dyn LlmProvider>,
}

impl LlmNode {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Node for LlmNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let prompt = ctx.require_str("prompt")?;

        ctx.events.info("Calling LLM provider");

        let response = self
            .provider
            .complete(prompt, &ctx.input)
            .await
            .map_err(|e| NodeError::ProviderUnavailable(e.to_string()))?;

        tracing::debug!("LLM node {} answered by {}", ctx.node_id, response.model);
        Ok(response.into())
    }
}

pub struct LlmNodeFactory {
    provider: Arc<dyn LlmProvider>,
}

impl LlmNodeFactory {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

impl NodeFactory for LlmNodeFactory {
    fn create(&self, _config: &BTreeMap<String, Value>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(LlmNode::new(self.provider.clone())))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Complete a prompt with the configured LLM provider".to_string(),
            category: "ai".to_string(),
            config: vec![ConfigField::required("prompt", "Prompt sent to the provider")],
        }
    }
}

/// Deterministic provider that never leaves the process
#[derive(Debug, Clone)]
pub struct MockLlmProvider {
    model: String,
}

impl MockLlmProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new("mock-gpt")
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, prompt: &str, context: &Value) -> Result<LlmResponse, LlmError> {
        let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        let body = Value::object()
            .with_field("summary", "mock-response")
            .with_field("prompt", preview)
            .with_field("inputType", context.type_name());

        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| LlmError::Unavailable(format!("mock provider failed: {}", e)))?;

        Ok(LlmResponse {
            text,
            model: self.model.clone(),
            mock: true,
        })
    }
}

/// Provider used when mock mode is off and no real provider is wired in
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredLlmProvider;

#[async_trait]
impl LlmProvider for UnconfiguredLlmProvider {
    async fn complete(&self, _prompt: &str, _context: &Value) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Unavailable(
            "LLM mock mode disabled but no provider configured".to_string(),
        ))
    }
}
