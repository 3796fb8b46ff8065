use crate::{events::EventEmitter, NodeError, NodeId, NodeKind, RunId, Value};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// The kind this node executes
    fn kind(&self) -> NodeKind;

    /// Execute the node with given context
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError>;
}

/// Execution context passed to each node
///
/// A node sees its own config and resolved input and nothing else of the run.
#[derive(Clone)]
pub struct NodeContext {
    pub run_id: RunId,
    pub node_id: NodeId,

    /// Input resolved from upstream nodes (or the run input for start nodes)
    pub input: Value,

    /// Static configuration for this node
    pub config: BTreeMap<String, Value>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl NodeContext {
    /// Get a required, non-empty string config value
    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        match self.config.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                Err(NodeError::MissingConfig(name.to_string()))
            }
            Some(other) => Err(NodeError::Configuration(format!(
                "'{}' must be a string, got {}",
                name,
                other.type_name()
            ))),
        }
    }
}
