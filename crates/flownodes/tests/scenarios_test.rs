use flowcore::{
    FlowError, LogPhase, NodeError, NodeKind, NodeSpec, RunStatus, RunStore, Value, Workflow,
    WorkflowError,
};
use flownodes::{default_registry, NodesConfig};
use flowruntime::{FlowRuntime, RuntimeConfig, SqliteRunStore};
use serde_json::json;
use std::sync::Arc;

fn runtime() -> FlowRuntime {
    FlowRuntime::with_registry(
        Arc::new(default_registry(&NodesConfig::default())),
        RuntimeConfig::default(),
    )
}

fn webhook_transform_llm() -> Workflow {
    Workflow::from_json(
        r#"{
            "name": "echo",
            "nodes": [
                { "id": "hook", "type": "webhook" },
                { "id": "shape", "type": "transform", "config": { "expr": "({...input, added: 123})" } },
                { "id": "ask", "type": "llm", "config": { "prompt": "Echo" } }
            ],
            "edges": [
                { "source": "hook", "target": "shape" },
                { "source": "shape", "target": "ask" }
            ]
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_webhook_transform_llm_succeeds() {
    let runtime = runtime();
    let wf = webhook_transform_llm();

    let outcome = runtime
        .execute(&wf, Value::from(json!({ "foo": "bar" })))
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.result.get("mock"), Some(&Value::Bool(true)));
    assert_eq!(
        outcome.result.get("model").and_then(Value::as_str),
        Some("mock-gpt")
    );
    assert!(outcome.trace.len() >= 6);

    // The transform saw the webhook envelope and added a field to it
    let shaped = outcome
        .trace
        .iter()
        .find(|e| e.node_id == "shape" && e.phase == LogPhase::Success)
        .and_then(|e| e.payload.get("output"))
        .unwrap();
    assert_eq!(shaped.get("added"), Some(&Value::Number(123.0)));
    assert_eq!(
        shaped.get("payload"),
        Some(&Value::from(json!({ "foo": "bar" })))
    );
    assert_eq!(shaped.get("nodeId").and_then(Value::as_str), Some("hook"));

    let (run, _) = runtime.inspect_run(outcome.run_id).await.unwrap().unwrap();
    assert_eq!(run.result, Some(outcome.result));
}

#[tokio::test]
async fn test_cyclic_workflow_fails_without_logs() {
    let mut wf = Workflow::new("cycle");
    wf.add_node(NodeSpec::new("A", NodeKind::Transform));
    wf.add_node(NodeSpec::new("B", NodeKind::Transform));
    wf.connect("A", "B");
    wf.connect("B", "A");

    let outcome = runtime().execute(&wf, Value::Null).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.trace.is_empty());
    assert!(matches!(
        outcome.error,
        Some(FlowError::Workflow(WorkflowError::Cycle { .. }))
    ));
    let message = outcome.result.get("error").and_then(Value::as_str).unwrap();
    assert!(message.contains("cycle"));
}

#[tokio::test]
async fn test_http_without_url_stops_the_run() {
    let mut wf = Workflow::new("no-url");
    wf.add_node(NodeSpec::new("call", NodeKind::Http).with_config("url", ""));
    wf.add_node(NodeSpec::new("after", NodeKind::Transform));
    wf.connect("call", "after");

    let outcome = runtime().execute(&wf, Value::Null).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(
        outcome.error.as_ref().and_then(FlowError::node_error),
        Some(&NodeError::MissingConfig("url".to_string()))
    );

    let phases: Vec<_> = outcome
        .trace
        .iter()
        .map(|e| (e.node_id.as_str(), e.phase))
        .collect();
    assert_eq!(
        phases,
        vec![("call", LogPhase::Start), ("call", LogPhase::Failure)]
    );
}

#[tokio::test]
async fn test_failing_middle_node_skips_the_rest() {
    let mut wf = Workflow::new("three");
    wf.add_node(NodeSpec::new("hook", NodeKind::Webhook));
    wf.add_node(
        NodeSpec::new("broken", NodeKind::Transform).with_config("expr", "input.nodeId.length.x"),
    );
    wf.add_node(NodeSpec::new("ask", NodeKind::Llm).with_config("prompt", "never"));
    wf.connect("hook", "broken");
    wf.connect("broken", "ask");

    let outcome = runtime().execute(&wf, Value::from("x")).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(matches!(
        outcome.error.as_ref().and_then(FlowError::node_error),
        Some(NodeError::Evaluation(_))
    ));
    assert!(outcome.trace.iter().all(|e| e.node_id != "ask"));
    assert_eq!(outcome.trace.len(), 4);
}

#[tokio::test]
async fn test_llm_without_mock_fails_as_unavailable() {
    let mut config = NodesConfig::default();
    config.llm.mock = false;
    let runtime = FlowRuntime::with_registry(
        Arc::new(default_registry(&config)),
        RuntimeConfig::default(),
    );

    let outcome = runtime
        .execute(&webhook_transform_llm(), Value::Null)
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(matches!(
        outcome.error.as_ref().and_then(FlowError::node_error),
        Some(NodeError::ProviderUnavailable(_))
    ));
}

#[tokio::test]
async fn test_runs_persist_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteRunStore::open(&dir.path().join("runs.db")).unwrap());
    let runtime = FlowRuntime::with_store(
        Arc::new(default_registry(&NodesConfig::default())),
        store,
        RuntimeConfig::default(),
    );
    let wf = webhook_transform_llm();

    let outcome = runtime
        .execute(&wf, Value::from(json!({ "foo": "bar" })))
        .await
        .unwrap();

    let runs = runtime.store().list_runs(&wf.reference()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, outcome.run_id);
    assert_eq!(runs[0].status, RunStatus::Succeeded);

    let logs = runtime.store().run_logs(outcome.run_id).await.unwrap();
    assert_eq!(logs, outcome.trace);
    assert_eq!(logs.len(), 6);
}
