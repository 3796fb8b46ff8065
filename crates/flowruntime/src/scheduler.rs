use flowcore::{Edge, NodeSpec, WorkflowError};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Order nodes for execution so that every edge source precedes its target.
///
/// Kahn's algorithm with a FIFO queue. Graph indices follow the node list,
/// and nodes that become ready together are enqueued in node-list order, so
/// the result is deterministic for a given definition.
pub fn order<'a>(nodes: &'a [NodeSpec], edges: &[Edge]) -> Result<Vec<&'a NodeSpec>, WorkflowError> {
    let graph = build_graph(nodes, edges)?;

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();

    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(idx) = queue.pop_front() {
        ordered.push(&nodes[idx.index()]);

        let mut ready = Vec::new();
        // parallel edges are yielded once per edge, matching the in-degree count
        for next in graph.neighbors_directed(idx, Direction::Outgoing) {
            let degree = &mut in_degree[next.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(next);
            }
        }
        ready.sort();
        queue.extend(ready);
    }

    if ordered.len() < nodes.len() {
        let stuck = in_degree
            .iter()
            .position(|&degree| degree > 0)
            .map(|pos| nodes[pos].id.clone());
        return Err(WorkflowError::Cycle { node: stuck });
    }

    Ok(ordered)
}

/// Build a dependency graph whose node indices match positions in `nodes`
fn build_graph<'a>(nodes: &'a [NodeSpec], edges: &[Edge]) -> Result<DiGraph<&'a str, ()>, WorkflowError> {
    let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut node_to_index = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let idx = graph.add_node(node.id.as_str());
        node_to_index.entry(node.id.as_str()).or_insert(idx);
    }

    for edge in edges {
        let lookup = |id: &String| {
            node_to_index
                .get(id.as_str())
                .copied()
                .ok_or_else(|| WorkflowError::DanglingEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    missing: id.clone(),
                })
        };
        let from_idx = lookup(&edge.source)?;
        let to_idx = lookup(&edge.target)?;
        graph.add_edge(from_idx, to_idx, ());
    }

    Ok(graph)
}
