use flowcore::{Edge, NodeKind, NodeSpec, Workflow, WorkflowError};
use flowruntime::{scheduler, validator};

fn node(id: &str) -> NodeSpec {
    NodeSpec::new(id, NodeKind::Transform)
}

fn edge(source: &str, target: &str) -> Edge {
    Edge {
        source: source.to_string(),
        target: target.to_string(),
    }
}

fn ids(order: &[&NodeSpec]) -> Vec<String> {
    order.iter().map(|n| n.id.clone()).collect()
}

#[test]
fn test_linear_chain_order() {
    let nodes = vec![node("c"), node("b"), node("a")];
    let edges = vec![edge("a", "b"), edge("b", "c")];

    let order = scheduler::order(&nodes, &edges).unwrap();
    assert_eq!(ids(&order), vec!["a", "b", "c"]);
}

#[test]
fn test_independent_nodes_keep_list_order() {
    let nodes = vec![node("x"), node("y"), node("z")];
    let order = scheduler::order(&nodes, &[]).unwrap();
    assert_eq!(ids(&order), vec!["x", "y", "z"]);
}

#[test]
fn test_diamond_respects_every_edge() {
    let nodes = vec![node("join"), node("right"), node("left"), node("root")];
    let edges = vec![
        edge("root", "left"),
        edge("root", "right"),
        edge("left", "join"),
        edge("right", "join"),
    ];

    let order = ids(&scheduler::order(&nodes, &edges).unwrap());
    assert_eq!(order.len(), 4);
    for e in &edges {
        let s = order.iter().position(|id| *id == e.source).unwrap();
        let t = order.iter().position(|id| *id == e.target).unwrap();
        assert!(s < t, "{} must run before {}", e.source, e.target);
    }
    // Newly ready siblings are released in list order
    assert_eq!(order, vec!["root", "right", "left", "join"]);
}

#[test]
fn test_order_is_stable_across_calls() {
    let nodes = vec![node("a"), node("b"), node("c"), node("d")];
    let edges = vec![edge("a", "d"), edge("b", "d"), edge("c", "d")];

    let first = ids(&scheduler::order(&nodes, &edges).unwrap());
    let second = ids(&scheduler::order(&nodes, &edges).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_two_node_cycle_detected() {
    let nodes = vec![node("A"), node("B")];
    let edges = vec![edge("A", "B"), edge("B", "A")];

    let err = scheduler::order(&nodes, &edges).unwrap_err();
    assert_eq!(
        err,
        WorkflowError::Cycle {
            node: Some("A".to_string())
        }
    );
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_cycle_behind_valid_prefix() {
    let nodes = vec![node("start"), node("loop1"), node("loop2")];
    let edges = vec![
        edge("start", "loop1"),
        edge("loop1", "loop2"),
        edge("loop2", "loop1"),
    ];

    let err = scheduler::order(&nodes, &edges).unwrap_err();
    assert_eq!(
        err,
        WorkflowError::Cycle {
            node: Some("loop1".to_string())
        }
    );
}

#[test]
fn test_self_loop_is_a_cycle() {
    let nodes = vec![node("a")];
    let edges = vec![edge("a", "a")];
    assert!(matches!(
        scheduler::order(&nodes, &edges),
        Err(WorkflowError::Cycle { .. })
    ));
}

#[test]
fn test_dangling_edge_rejected_by_scheduler() {
    let nodes = vec![node("a")];
    let edges = vec![edge("a", "ghost")];

    match scheduler::order(&nodes, &edges) {
        Err(WorkflowError::DanglingEdge { missing, .. }) => assert_eq!(missing, "ghost"),
        other => panic!("expected dangling edge, got {:?}", other.map(|o| ids(&o))),
    }
}

#[test]
fn test_validate_accepts_well_formed_workflow() {
    let mut wf = Workflow::new("ok");
    wf.add_node(NodeSpec::new("hook", NodeKind::Webhook));
    wf.add_node(NodeSpec::new("shape", NodeKind::Transform));
    wf.connect("hook", "shape");

    assert!(validator::validate(&wf).is_ok());
    // Idempotent and side-effect free
    assert!(validator::validate(&wf).is_ok());
}

#[test]
fn test_validate_rejects_duplicate_ids() {
    let mut wf = Workflow::new("dupes");
    wf.add_node(NodeSpec::new("a", NodeKind::Webhook));
    wf.add_node(NodeSpec::new("a", NodeKind::Transform));

    assert_eq!(
        validator::validate(&wf),
        Err(WorkflowError::DuplicateNodeId("a".to_string()))
    );
}

#[test]
fn test_validate_rejects_unknown_type() {
    let mut wf = Workflow::new("unknown");
    wf.add_node(NodeSpec::with_type("mystery", "email"));

    assert_eq!(
        validator::validate(&wf),
        Err(WorkflowError::UnknownNodeType {
            node_id: "mystery".to_string(),
            node_type: "email".to_string(),
        })
    );
}

#[test]
fn test_validate_rejects_dangling_edge() {
    let mut wf = Workflow::new("dangling");
    wf.add_node(NodeSpec::new("a", NodeKind::Webhook));
    wf.connect("missing", "a");

    let err = validator::validate(&wf).unwrap_err();
    assert_eq!(
        err,
        WorkflowError::DanglingEdge {
            from: "missing".to_string(),
            to: "a".to_string(),
            missing: "missing".to_string(),
        }
    );
}

#[test]
fn test_validate_does_not_detect_cycles() {
    let mut wf = Workflow::new("cyclic");
    wf.add_node(NodeSpec::new("A", NodeKind::Transform));
    wf.add_node(NodeSpec::new("B", NodeKind::Transform));
    wf.connect("A", "B");
    wf.connect("B", "A");

    assert!(validator::validate(&wf).is_ok());
    assert!(scheduler::order(&wf.nodes, &wf.edges).is_err());
}
