use crate::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response returned by an LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub mock: bool,
}

impl From<LlmResponse> for Value {
    fn from(resp: LlmResponse) -> Self {
        Value::object()
            .with_field("text", resp.text)
            .with_field("model", resp.model)
            .with_field("mock", resp.mock)
    }
}

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("{0}")]
    Unavailable(String),
}

/// Completion provider used by `llm` nodes
///
/// Timeouts and transport concerns belong to the implementation.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str, context: &Value) -> Result<LlmResponse, LlmError>;
}
