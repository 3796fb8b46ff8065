use flowcore::{EventBus, LlmProvider, Node, NodeContext, NodeError, Value};
use flownodes::{
    LlmConfig, LlmNode, MockLlmProvider, TransformNode, UnconfiguredLlmProvider, WebhookNode,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn config(value: serde_json::Value) -> BTreeMap<String, Value> {
    Value::from(value).as_object().cloned().unwrap_or_default()
}

fn context(node_id: &str, config: BTreeMap<String, Value>, input: Value) -> NodeContext {
    let bus = EventBus::new(100);
    NodeContext {
        run_id: uuid::Uuid::new_v4(),
        node_id: node_id.to_string(),
        input,
        config,
        events: bus.create_emitter(uuid::Uuid::new_v4(), node_id.to_string()),
    }
}

#[tokio::test]
async fn test_webhook_wraps_payload() {
    let input = Value::from(json!({ "foo": "bar" }));
    let output = WebhookNode
        .execute(context("hook", BTreeMap::new(), input.clone()))
        .await
        .unwrap();

    assert_eq!(output.get("nodeId").and_then(Value::as_str), Some("hook"));
    assert_eq!(output.get("payload"), Some(&input));

    let received = output.get("receivedAt").and_then(Value::as_str).unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(received).is_ok());
}

#[tokio::test]
async fn test_transform_expression_spreads_input() {
    let cfg = config(json!({ "expr": "({...input, added: 123})" }));
    let node = TransformNode::from_config(&cfg).unwrap();

    let output = node
        .execute(context("shape", cfg, Value::from(json!({ "foo": "bar" }))))
        .await
        .unwrap();

    assert_eq!(output, Value::from(json!({ "foo": "bar", "added": 123 })));
}

#[tokio::test]
async fn test_transform_mapping_projects_paths() {
    let cfg = config(json!({
        "mapping": { "name": "user.name", "firstTag": "user.tags.0", "missing": "user.nope" }
    }));
    let node = TransformNode::from_config(&cfg).unwrap();
    let input = Value::from(json!({ "user": { "name": "ada", "tags": ["x"] } }));

    let output = node.execute(context("map", cfg, input)).await.unwrap();

    assert_eq!(
        output,
        Value::from(json!({ "name": "ada", "firstTag": "x", "missing": null }))
    );
}

#[tokio::test]
async fn test_transform_without_program_passes_through() {
    let node = TransformNode::from_config(&BTreeMap::new()).unwrap();
    let input = Value::from(json!([1, 2, 3]));

    let output = node
        .execute(context("noop", BTreeMap::new(), input.clone()))
        .await
        .unwrap();
    assert_eq!(output, input);
}

#[tokio::test]
async fn test_transform_syntax_error_is_evaluation_error() {
    let err = TransformNode::from_config(&config(json!({ "expr": "({...input," })))
        .err()
        .unwrap();
    assert!(matches!(err, NodeError::Evaluation(_)));

    let err = TransformNode::from_config(&config(json!({ "expr": "require('fs')" })))
        .err()
        .unwrap();
    assert!(matches!(err, NodeError::Evaluation(_)));
}

#[tokio::test]
async fn test_transform_deep_expression_is_evaluation_error() {
    let expr = format!("{}input{}", "[".repeat(10_000), "]".repeat(10_000));
    let err = TransformNode::from_config(&config(json!({ "expr": expr })))
        .err()
        .unwrap();
    assert!(matches!(err, NodeError::Evaluation(_)));
}

#[tokio::test]
async fn test_transform_runtime_error_is_evaluation_error() {
    let cfg = config(json!({ "expr": "input.count.value" }));
    let node = TransformNode::from_config(&cfg).unwrap();

    let err = node
        .execute(context("bad", cfg, Value::from(json!({ "count": 1 }))))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Evaluation(_)));
}

#[tokio::test]
async fn test_transform_rejects_non_string_expr() {
    let err = TransformNode::from_config(&config(json!({ "expr": 42 })))
        .err()
        .unwrap();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_mock_provider_is_deterministic() {
    let provider = MockLlmProvider::default();
    let context = Value::from(json!({ "a": 1 }));

    let first = provider.complete("Echo", &context).await.unwrap();
    let second = provider.complete("Echo", &context).await.unwrap();

    assert_eq!(first, second);
    assert!(first.mock);
    assert_eq!(first.model, "mock-gpt");

    let text: serde_json::Value = serde_json::from_str(&first.text).unwrap();
    assert_eq!(
        text,
        json!({ "summary": "mock-response", "prompt": "Echo", "inputType": "object" })
    );
}

#[tokio::test]
async fn test_mock_provider_truncates_prompt() {
    let long_prompt = "é".repeat(500);
    let response = MockLlmProvider::new("tiny")
        .complete(&long_prompt, &Value::Null)
        .await
        .unwrap();

    let text: serde_json::Value = serde_json::from_str(&response.text).unwrap();
    assert_eq!(text["prompt"].as_str().unwrap().chars().count(), 200);
    assert_eq!(text["inputType"], "null");
    assert_eq!(response.model, "tiny");
}

#[tokio::test]
async fn test_llm_node_returns_response_object() {
    let node = LlmNode::new(Arc::new(MockLlmProvider::default()));
    let output = node
        .execute(context(
            "ask",
            config(json!({ "prompt": "Echo" })),
            Value::from("text"),
        ))
        .await
        .unwrap();

    assert_eq!(output.get("mock"), Some(&Value::Bool(true)));
    assert_eq!(output.get("model").and_then(Value::as_str), Some("mock-gpt"));
    assert!(output
        .get("text")
        .and_then(Value::as_str)
        .unwrap()
        .contains("mock-response"));
}

#[tokio::test]
async fn test_llm_node_requires_prompt() {
    let node = LlmNode::new(Arc::new(MockLlmProvider::default()));
    let err = node
        .execute(context("ask", BTreeMap::new(), Value::Null))
        .await
        .unwrap_err();
    assert_eq!(err, NodeError::MissingConfig("prompt".to_string()));
}

#[tokio::test]
async fn test_llm_node_without_provider_is_unavailable() {
    let provider = LlmConfig {
        mock: false,
        model: "real-model".to_string(),
    }
    .provider();
    let node = LlmNode::new(provider);

    let err = node
        .execute(context("ask", config(json!({ "prompt": "hi" })), Value::Null))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NodeError::ProviderUnavailable(
            "LLM mock mode disabled but no provider configured".to_string()
        )
    );

    assert!(UnconfiguredLlmProvider
        .complete("hi", &Value::Null)
        .await
        .is_err());
}

#[test]
fn test_default_registry_covers_every_kind() {
    let registry = flownodes::default_registry(&flownodes::NodesConfig::default());

    for kind in flowcore::NodeKind::ALL {
        assert!(registry.supports(kind), "no handler for {}", kind);
        assert!(!registry.get_metadata(kind).unwrap().description.is_empty());
    }
    assert_eq!(registry.list_node_types().len(), 4);
}
