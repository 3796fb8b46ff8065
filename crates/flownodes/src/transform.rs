use crate::expr::{lookup_path, Expression};
use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeKind, Value};
use flowruntime::{ConfigField, NodeFactory, NodeMetadata};
use std::collections::BTreeMap;

/// How a transform node reshapes its input
#[derive(Debug, Clone)]
enum Program {
    Expression(Expression),
    /// target field -> dotted source path
    Mapping(BTreeMap<String, String>),
    Passthrough,
}

/// Reshapes its input with a restricted expression or a field mapping
pub struct TransformNode {
    program: Program,
}

impl TransformNode {
    /// Compile the node's config. `expr` wins over `mapping`.
    pub fn from_config(config: &BTreeMap<String, Value>) -> Result<Self, NodeError> {
        let program = match config.get("expr") {
            Some(Value::String(source)) => Program::Expression(
                Expression::parse(source).map_err(|e| NodeError::Evaluation(e.to_string()))?,
            ),
            Some(Value::Null) | None => match config.get("mapping") {
                Some(Value::Object(fields)) => {
                    let mut mapping = BTreeMap::new();
                    for (target, path) in fields {
                        let path = path.as_str().ok_or_else(|| {
                            NodeError::Configuration(format!(
                                "mapping for '{}' must be a string path, got {}",
                                target,
                                path.type_name()
                            ))
                        })?;
                        mapping.insert(target.clone(), path.to_string());
                    }
                    Program::Mapping(mapping)
                }
                Some(Value::Null) | None => Program::Passthrough,
                Some(other) => {
                    return Err(NodeError::Configuration(format!(
                        "'mapping' must be an object, got {}",
                        other.type_name()
                    )))
                }
            },
            Some(other) => {
                return Err(NodeError::Configuration(format!(
                    "'expr' must be a string, got {}",
                    other.type_name()
                )))
            }
        };

        Ok(Self { program })
    }
}

#[async_trait]
impl Node for TransformNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        match &self.program {
            Program::Expression(expr) => expr
                .evaluate(&ctx.input)
                .map_err(|e| NodeError::Evaluation(e.to_string())),
            Program::Mapping(mapping) => {
                let projected = mapping
                    .iter()
                    .map(|(target, path)| (target.clone(), lookup_path(&ctx.input, path)))
                    .collect::<BTreeMap<_, _>>();
                Ok(Value::Object(projected))
            }
            Program::Passthrough => {
                ctx.events.warn("No expr or mapping configured, passing input through");
                Ok(ctx.input)
            }
        }
    }
}

pub struct TransformNodeFactory;

impl NodeFactory for TransformNodeFactory {
    fn create(&self, config: &BTreeMap<String, Value>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TransformNode::from_config(config)?))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Reshape the input with an expression or field mapping".to_string(),
            category: "transform".to_string(),
            config: vec![
                ConfigField::optional("expr", "Expression over `input`"),
                ConfigField::optional("mapping", "Object of target field to dotted source path"),
            ],
        }
    }
}
