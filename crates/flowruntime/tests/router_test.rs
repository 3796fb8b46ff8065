use flowcore::{Edge, Value};
use flowruntime::{resolve_input, ExecutionContext};
use serde_json::json;

fn edge(source: &str, target: &str) -> Edge {
    Edge {
        source: source.to_string(),
        target: target.to_string(),
    }
}

#[test]
fn test_start_node_gets_run_input() {
    let input = Value::from(json!({ "foo": "bar" }));
    let ctx = ExecutionContext::new(input.clone());

    assert_eq!(resolve_input("start", &[], &ctx), input);
    assert_eq!(resolve_input("start", &[edge("start", "next")], &ctx), input);
}

#[test]
fn test_single_upstream_passes_output_verbatim() {
    let mut ctx = ExecutionContext::new(Value::from(json!({ "ignored": true })));
    ctx.record_output("a", Value::from(json!([1, 2, 3])));

    let resolved = resolve_input("b", &[edge("a", "b")], &ctx);
    assert_eq!(resolved, Value::from(json!([1, 2, 3])));
}

#[test]
fn test_fan_in_keys_by_upstream_id() {
    let mut ctx = ExecutionContext::new(Value::Null);
    ctx.record_output("left", Value::from("L"));
    ctx.record_output("right", Value::from(json!({ "n": 2 })));

    let edges = vec![edge("left", "join"), edge("right", "join")];
    let resolved = resolve_input("join", &edges, &ctx);

    assert_eq!(
        resolved,
        Value::from(json!({ "left": "L", "right": { "n": 2 } }))
    );
}

#[test]
fn test_duplicate_edges_collapse_into_one_key() {
    let mut ctx = ExecutionContext::new(Value::Null);
    ctx.record_output("a", Value::from(1_i64));

    let edges = vec![edge("a", "b"), edge("a", "b")];
    let resolved = resolve_input("b", &edges, &ctx);

    assert_eq!(resolved, Value::from(json!({ "a": 1 })));
}

#[test]
fn test_missing_upstream_output_is_null() {
    let ctx = ExecutionContext::new(Value::Null);
    assert_eq!(resolve_input("b", &[edge("a", "b")], &ctx), Value::Null);
}

#[test]
fn test_context_tracks_completed_nodes() {
    let mut ctx = ExecutionContext::new(Value::from("in"));
    assert_eq!(ctx.completed(), 0);
    ctx.record_output("a", Value::from(1_i64));
    ctx.record_output("b", Value::from(2_i64));

    assert_eq!(ctx.completed(), 2);
    assert_eq!(ctx.output("a"), Some(&Value::from(1_i64)));
    assert_eq!(ctx.input(), &Value::from("in"));
}
