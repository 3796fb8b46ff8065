use flowcore::{
    EventBus, NodeContext, NodeError, NodeKind, RunStatus, Value, Workflow, WorkflowError,
};
use serde_json::json;
use std::collections::BTreeMap;

#[test]
fn test_workflow_from_json() {
    let wf = Workflow::from_json(
        r#"{
            "name": "demo",
            "nodes": [
                { "id": "hook", "type": "webhook" },
                { "id": "shape", "type": "transform", "config": { "expr": "input" } }
            ],
            "edges": [{ "source": "hook", "target": "shape" }]
        }"#,
    )
    .unwrap();

    assert_eq!(wf.name, "demo");
    assert_eq!(wf.nodes[0].kind(), Some(NodeKind::Webhook));
    assert_eq!(
        wf.find_node("shape").unwrap().config.get("expr"),
        Some(&Value::from("input"))
    );
    assert_eq!(wf.edges[0].target, "shape");
}

#[test]
fn test_unknown_type_survives_parsing() {
    let wf = Workflow::from_json(r#"{ "nodes": [{ "id": "x", "type": "email" }] }"#).unwrap();
    assert_eq!(wf.nodes[0].node_type, "email");
    assert_eq!(wf.nodes[0].kind(), None);
    assert!(wf.edges.is_empty());
}

#[test]
fn test_missing_id_is_regenerated_per_load() {
    let anonymous = r#"{ "nodes": [] }"#;
    assert!(!Workflow::declares_id(anonymous));
    let first = Workflow::from_json(anonymous).unwrap();
    let second = Workflow::from_json(anonymous).unwrap();
    assert_ne!(first.reference(), second.reference());

    let pinned = r#"{ "id": "6f1c2a9e-3b4d-4e5f-8a7b-9c0d1e2f3a4b", "nodes": [] }"#;
    assert!(Workflow::declares_id(pinned));
    assert_eq!(
        Workflow::from_json(pinned).unwrap().reference(),
        Workflow::from_json(pinned).unwrap().reference()
    );

    assert!(!Workflow::declares_id(r#"{ "id": null, "nodes": [] }"#));
    assert!(!Workflow::declares_id("not json"));
}

#[test]
fn test_malformed_workflow_is_invalid() {
    assert!(matches!(
        Workflow::from_json(r#"{ "nodes": 3 }"#),
        Err(WorkflowError::Invalid(_))
    ));
}

#[test]
fn test_value_json_round_trip_keeps_integers() {
    let original = json!({ "n": 3, "f": 1.5, "list": [true, null, "s"] });
    let value = Value::from(original.clone());

    assert_eq!(value.to_json(), original);
    assert_eq!(serde_json::to_string(&value).unwrap(), original.to_string());
}

#[test]
fn test_value_accessors() {
    let value = Value::from(json!({ "name": "ada", "age": 36 }));
    assert_eq!(value.get("name").and_then(Value::as_str), Some("ada"));
    assert_eq!(value.get("age").and_then(Value::as_f64), Some(36.0));
    assert!(value.get("missing").is_none());
    assert_eq!(value.type_name(), "object");
    assert_eq!(Value::Null.to_string(), "null");
}

#[test]
fn test_run_status_transitions() {
    assert!(RunStatus::Queued.can_transition_to(RunStatus::Running));
    assert!(RunStatus::Running.can_transition_to(RunStatus::Succeeded));
    assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
    assert!(!RunStatus::Queued.can_transition_to(RunStatus::Succeeded));
    assert!(!RunStatus::Failed.can_transition_to(RunStatus::Running));
    assert!(RunStatus::Succeeded.is_terminal());
    assert_eq!("failed".parse::<RunStatus>(), Ok(RunStatus::Failed));
}

#[test]
fn test_require_str() {
    let bus = EventBus::new(10);
    let mut config = BTreeMap::new();
    config.insert("url".to_string(), Value::from("http://x"));
    config.insert("blank".to_string(), Value::from("  "));
    config.insert("count".to_string(), Value::from(3_i64));

    let ctx = NodeContext {
        run_id: uuid::Uuid::new_v4(),
        node_id: "n".to_string(),
        input: Value::Null,
        config,
        events: bus.create_emitter(uuid::Uuid::new_v4(), "n".to_string()),
    };

    assert_eq!(ctx.require_str("url"), Ok("http://x"));
    assert_eq!(
        ctx.require_str("blank"),
        Err(NodeError::MissingConfig("blank".to_string()))
    );
    assert_eq!(
        ctx.require_str("absent"),
        Err(NodeError::MissingConfig("absent".to_string()))
    );
    assert!(matches!(
        ctx.require_str("count"),
        Err(NodeError::Configuration(_))
    ));
}
