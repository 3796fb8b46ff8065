//! Standard node library
//!
//! Built-in handlers for the `webhook`, `http`, `llm` and `transform` node
//! types, plus the expression interpreter used by `transform`.

pub mod expr;
mod http;
mod llm;
mod transform;
mod webhook;

pub use http::{HttpRequestNode, HttpRequestNodeFactory};
pub use llm::{LlmNode, LlmNodeFactory, MockLlmProvider, UnconfiguredLlmProvider};
pub use transform::{TransformNode, TransformNodeFactory};
pub use webhook::{WebhookNode, WebhookNodeFactory};

use flowcore::LlmProvider;
use flowruntime::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Settings for the built-in nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodesConfig {
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Answer LLM nodes with [`MockLlmProvider`] instead of a real provider
    pub mock: bool,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mock: true,
            model: "mock-gpt".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn provider(&self) -> Arc<dyn LlmProvider> {
        if self.mock {
            Arc::new(MockLlmProvider::new(self.model.clone()))
        } else {
            Arc::new(UnconfiguredLlmProvider)
        }
    }
}

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry, config: &NodesConfig) {
    registry.register(Arc::new(WebhookNodeFactory));
    registry.register(Arc::new(HttpRequestNodeFactory::new()));
    registry.register(Arc::new(LlmNodeFactory::new(config.llm.provider())));
    registry.register(Arc::new(TransformNodeFactory));
}

/// Build a registry holding every standard node
pub fn default_registry(config: &NodesConfig) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry, config);
    registry
}
