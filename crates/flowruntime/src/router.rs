use flowcore::{Edge, NodeId, Value};
use std::collections::{BTreeMap, HashMap};

/// Run-scoped state: the run input and the outputs of nodes executed so far
///
/// Only ever holds outputs of the already-processed prefix of the execution
/// order. Dropped when the run finishes.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    input: Value,
    outputs: HashMap<NodeId, Value>,
}

impl ExecutionContext {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            outputs: HashMap::new(),
        }
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    pub fn record_output(&mut self, node_id: impl Into<NodeId>, output: Value) {
        self.outputs.insert(node_id.into(), output);
    }

    pub fn completed(&self) -> usize {
        self.outputs.len()
    }
}

/// Compute the input for a node from its incoming edges.
///
/// - no incoming edge: the original run input
/// - one incoming edge: the upstream output, verbatim
/// - several: an object keyed by upstream node id
pub fn resolve_input(node_id: &str, edges: &[Edge], ctx: &ExecutionContext) -> Value {
    let sources: Vec<&str> = edges
        .iter()
        .filter(|edge| edge.target == node_id)
        .map(|edge| edge.source.as_str())
        .collect();

    match sources.as_slice() {
        [] => ctx.input.clone(),
        [source] => upstream(ctx, source),
        _ => {
            let merged: BTreeMap<String, Value> = sources
                .iter()
                .map(|source| (source.to_string(), upstream(ctx, source)))
                .collect();
            Value::Object(merged)
        }
    }
}

fn upstream(ctx: &ExecutionContext, source: &str) -> Value {
    ctx.output(source).cloned().unwrap_or_else(|| {
        tracing::warn!("upstream node '{}' has no recorded output", source);
        Value::Null
    })
}
