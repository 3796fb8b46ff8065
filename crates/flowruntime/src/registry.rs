use flowcore::{Node, NodeContext, NodeError, NodeKind, NodeSpec, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Create a new instance of the node with given configuration
    fn create(&self, config: &BTreeMap<String, Value>) -> Result<Box<dyn Node>, NodeError>;

    /// The node kind this factory handles
    fn kind(&self) -> NodeKind;

    /// Optional: Get node metadata (description, config fields)
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
    pub config: Vec<ConfigField>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            config: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigField {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ConfigField {
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
        }
    }
}

/// Maps node kinds to their handlers and dispatches execution
pub struct NodeRegistry {
    factories: HashMap<NodeKind, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a node factory, replacing any previous one for the same kind
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let kind = factory.kind();
        tracing::info!("Registering node type: {}", kind);
        self.factories.insert(kind, factory);
    }

    pub fn supports(&self, kind: NodeKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Create a node instance for a node spec
    ///
    /// The validator has already rejected unknown types; reaching the error
    /// paths here means the registry was not populated for a valid kind.
    pub fn create_node(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        let kind = spec.kind().ok_or_else(|| {
            NodeError::ExecutionFailed(format!(
                "node '{}' has unsupported type '{}'",
                spec.id, spec.node_type
            ))
        })?;

        let factory = self.factories.get(&kind).ok_or_else(|| {
            NodeError::ExecutionFailed(format!("no handler registered for node type '{}'", kind))
        })?;

        factory.create(&spec.config)
    }

    /// Execute a node through the handler registered for its kind
    pub async fn dispatch(&self, spec: &NodeSpec, ctx: NodeContext) -> Result<Value, NodeError> {
        let node = self.create_node(spec)?;
        tracing::debug!("Dispatching node {} ({})", spec.id, node.kind());
        node.execute(ctx).await
    }

    /// Get all registered node types, in a stable order
    pub fn list_node_types(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, kind: NodeKind) -> Option<NodeMetadata> {
        self.factories.get(&kind).map(|f| f.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
