use flowcore::{Workflow, WorkflowError};
use std::collections::HashSet;

/// Check the structural well-formedness of a workflow definition.
///
/// Node ids are checked first, then node types, then edge endpoints; the
/// first violation found is returned. Cycles are left to the scheduler.
pub fn validate(workflow: &Workflow) -> Result<(), WorkflowError> {
    let mut ids = HashSet::with_capacity(workflow.nodes.len());
    for node in &workflow.nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
        }
    }

    for node in &workflow.nodes {
        if node.kind().is_none() {
            return Err(WorkflowError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }

    for edge in &workflow.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) {
                return Err(WorkflowError::DanglingEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }

    Ok(())
}
