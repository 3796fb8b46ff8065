use crate::{Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = String;

/// Complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: WorkflowId,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Parse a workflow definition from JSON text
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        serde_json::from_str(json).map_err(|e| WorkflowError::Invalid(e.to_string()))
    }

    /// Whether the JSON text carries its own `id`
    ///
    /// Definitions without one get a fresh id on every load, so their runs
    /// never share a reference.
    pub fn declares_id(json: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(json)
            .ok()
            .and_then(|doc| doc.get("id").map(|id| !id.is_null()))
            .unwrap_or(false)
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.edges.push(Edge {
            source: source.into(),
            target: target.into(),
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Reference stored on every run of this workflow
    pub fn reference(&self) -> String {
        self.id.to_string()
    }
}

/// Node specification in a workflow
///
/// `node_type` stays a plain string so that definitions with types outside
/// [`NodeKind`] still load and can be rejected with a precise error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self::with_type(id, kind.as_str())
    }

    /// Build a node with an arbitrary type string
    pub fn with_type(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// The node kind, if the type string is one of the supported kinds
    pub fn kind(&self) -> Option<NodeKind> {
        self.node_type.parse().ok()
    }
}

/// Directed edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/// The closed set of node types the engine can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Webhook,
    Http,
    Llm,
    Transform,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Webhook,
        NodeKind::Http,
        NodeKind::Llm,
        NodeKind::Transform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Webhook => "webhook",
            NodeKind::Http => "http",
            NodeKind::Llm => "llm",
            NodeKind::Transform => "transform",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(NodeKind::Webhook),
            "http" => Ok(NodeKind::Http),
            "llm" => Ok(NodeKind::Llm),
            "transform" => Ok(NodeKind::Transform),
            other => Err(format!("unknown node type: {other}")),
        }
    }
}
