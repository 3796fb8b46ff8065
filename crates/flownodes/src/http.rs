use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeKind, Value};
use flowruntime::{ConfigField, NodeFactory, NodeMetadata};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::collections::BTreeMap;

/// HTTP request node
///
/// Any response status is a successful output; only transport failures fail
/// the node.
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_method(raw: &str) -> Result<Method, NodeError> {
    match raw.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        _ => Err(NodeError::Configuration(format!(
            "Unsupported method: {}",
            raw
        ))),
    }
}

fn build_headers(ctx: &NodeContext) -> Result<HeaderMap, NodeError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    match ctx.config.get("headers") {
        None | Some(Value::Null) => {}
        Some(Value::Object(extra)) => {
            for (key, value) in extra {
                let Some(text) = value.as_str() else {
                    ctx.events.warn(format!(
                        "Ignoring header '{}': expected a string, got {}",
                        key,
                        value.type_name()
                    ));
                    continue;
                };
                let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    NodeError::Configuration(format!("Invalid header name '{}': {}", key, e))
                })?;
                let value = HeaderValue::from_str(text).map_err(|e| {
                    NodeError::Configuration(format!("Invalid value for header '{}': {}", key, e))
                })?;
                headers.insert(name, value);
            }
        }
        Some(other) => {
            return Err(NodeError::Configuration(format!(
                "'headers' must be an object, got {}",
                other.type_name()
            )))
        }
    }

    Ok(headers)
}

#[async_trait]
impl Node for HttpRequestNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Http
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let url = ctx.require_str("url")?;
        let method = match ctx.config.get("method") {
            None | Some(Value::Null) => Method::POST,
            Some(Value::String(m)) => parse_method(m)?,
            Some(other) => {
                return Err(NodeError::Configuration(format!(
                    "'method' must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        let headers = build_headers(&ctx)?;

        ctx.events.info(format!("{} {}", method, url));

        let mut request = self.client.request(method.clone(), url).headers(headers);
        if method != Method::GET && method != Method::HEAD {
            let body = ctx.config.get("body").unwrap_or(&ctx.input);
            let encoded = serde_json::to_string(body).map_err(|e| {
                NodeError::ExecutionFailed(format!("Failed to encode request body: {}", e))
            })?;
            request = request.body(encoded);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let raw_text = response
            .text()
            .await
            .map_err(|e| NodeError::Network(format!("Failed to read response: {}", e)))?;

        let parsed = serde_json::from_str::<serde_json::Value>(&raw_text)
            .map(Value::from)
            .unwrap_or(Value::Null);

        ctx.events.info(format!("Response status: {}", status.as_u16()));
        tracing::debug!("HTTP {} returned {}", url, status);

        Ok(Value::object()
            .with_field("status", status.as_u16())
            .with_field("ok", status.is_success())
            .with_field("rawText", raw_text)
            .with_field("parsedJson", parsed))
    }
}

pub struct HttpRequestNodeFactory {
    client: reqwest::Client,
}

impl HttpRequestNodeFactory {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for HttpRequestNodeFactory {
    fn create(&self, _config: &BTreeMap<String, Value>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(HttpRequestNode::with_client(self.client.clone())))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Http
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
            config: vec![
                ConfigField::required("url", "Request URL"),
                ConfigField::optional("method", "HTTP method, defaults to POST"),
                ConfigField::optional("headers", "Extra request headers"),
                ConfigField::optional("body", "Request body, defaults to the node input"),
            ],
        }
    }
}
