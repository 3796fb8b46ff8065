use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use flowcore::{Node, NodeContext, NodeError, NodeKind, Value};
use flowruntime::{NodeFactory, NodeMetadata};
use std::collections::BTreeMap;

/// Entry point of a workflow: wraps the trigger payload
pub struct WebhookNode;

#[async_trait]
impl Node for WebhookNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Webhook
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        Ok(Value::object()
            .with_field("nodeId", ctx.node_id.as_str())
            .with_field(
                "receivedAt",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .with_field("payload", ctx.input))
    }
}

pub struct WebhookNodeFactory;

impl NodeFactory for WebhookNodeFactory {
    fn create(&self, _config: &BTreeMap<String, Value>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(WebhookNode))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Webhook
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Receive the trigger payload".to_string(),
            category: "trigger".to_string(),
            config: vec![],
        }
    }
}
