use std::sync::Arc;

use async_trait::async_trait;
use cubicler_mcp_dispatcher::McpDispatcher;
use cubicler_types::{AgentRequest, AgentResponse, Message, MessageKind};
use serde_json::Value;

use crate::error::AgentTransportError;
use crate::{validate_response, AgentTransport};

/// The extension point a concrete model backend (OpenAI, Anthropic, ...)
/// implements for the Direct transport (spec §4.8.4). Cubicler itself never
/// runs a model; `DirectProvider` is the seam a backend plugs into, built
/// fresh per dispatch from the agent's `direct` config.
#[async_trait]
pub trait DirectProvider: Send + Sync {
    async fn complete(&self, request: AgentRequest, tools: Arc<McpDispatcher>) -> Result<AgentResponse, AgentTransportError>;
}

/// Converts message kinds the underlying model can't natively accept into
/// plain text before handing the request to the provider (spec §4.8.4):
/// `image` and `url` content collapse to a descriptive text line, `text`
/// and `null` pass through unchanged.
pub fn normalize_for_model(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|mut m| {
            m.content = normalize_content(m.kind, &m.content, m.metadata.as_ref());
            if matches!(m.kind, MessageKind::Image | MessageKind::Url) {
                m.kind = MessageKind::Text;
            }
            m
        })
        .collect()
}

fn normalize_content(kind: MessageKind, content: &Value, metadata: Option<&Value>) -> Value {
    match kind {
        MessageKind::Image => {
            let raw = content.as_str().unwrap_or_default();
            match file_name(metadata) {
                Some(name) => Value::String(format!("[Image content]: {raw} ({name})")),
                None => Value::String(format!("[Image content]: {raw}")),
            }
        }
        MessageKind::Url => {
            let raw = content.as_str().unwrap_or_default();
            Value::String(format!("[URL reference]: {raw}"))
        }
        MessageKind::Text | MessageKind::Null => content.clone(),
    }
}

fn file_name(metadata: Option<&Value>) -> Option<&str> {
    metadata?.get("fileName")?.as_str()
}

pub struct DirectTransport {
    provider: Arc<dyn DirectProvider>,
    dispatcher: Arc<McpDispatcher>,
}

impl DirectTransport {
    pub fn new(provider: Arc<dyn DirectProvider>, dispatcher: Arc<McpDispatcher>) -> Self {
        Self { provider, dispatcher }
    }
}

#[async_trait]
impl AgentTransport for DirectTransport {
    async fn dispatch(&self, mut request: AgentRequest) -> Result<AgentResponse, AgentTransportError> {
        request.messages = normalize_for_model(request.messages);
        let response = self.provider.complete(request, self.dispatcher.clone()).await?;
        validate_response(&response)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_protocol::{McpError, ToolProvider};
    use cubicler_types::{AgentContext, ResponseMetadata, Sender, ToolDefinition};
    use pretty_assertions::assert_eq;

    struct EmptyProvider;

    #[async_trait]
    impl ToolProvider for EmptyProvider {
        async fn can_handle(&self, _tool_name: &str) -> bool {
            false
        }
        async fn list_tools(&self) -> Vec<ToolDefinition> {
            vec![]
        }
        async fn call_tool(&self, _tool_name: &str, _arguments: Value) -> Result<Value, McpError> {
            Err(McpError::method_not_found("unused in this test"))
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl DirectProvider for EchoProvider {
        async fn complete(&self, request: AgentRequest, _tools: Arc<McpDispatcher>) -> Result<AgentResponse, AgentTransportError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or(Value::Null);
            Ok(AgentResponse {
                timestamp: chrono::Utc::now(),
                kind: MessageKind::Text,
                content: last,
                metadata: ResponseMetadata::zero(),
            })
        }
    }

    fn dispatcher() -> Arc<McpDispatcher> {
        Arc::new(McpDispatcher::new(Arc::new(EmptyProvider), Arc::new(EmptyProvider), Arc::new(EmptyProvider)))
    }

    #[test]
    fn image_messages_become_descriptive_text() {
        let messages = vec![Message {
            sender: Sender { id: "u".into(), name: "User".into() },
            timestamp: chrono::Utc::now(),
            kind: MessageKind::Image,
            content: serde_json::json!("base64data"),
            metadata: None,
        }];
        let normalized = normalize_for_model(messages);
        assert_eq!(normalized[0].kind, MessageKind::Text);
        assert_eq!(normalized[0].content, serde_json::json!("[Image content]: base64data"));
    }

    #[test]
    fn image_messages_with_a_file_name_append_it() {
        let messages = vec![Message {
            sender: Sender { id: "u".into(), name: "User".into() },
            timestamp: chrono::Utc::now(),
            kind: MessageKind::Image,
            content: serde_json::json!("base64data"),
            metadata: Some(serde_json::json!({"fileName": "photo.png"})),
        }];
        let normalized = normalize_for_model(messages);
        assert_eq!(normalized[0].content, serde_json::json!("[Image content]: base64data (photo.png)"));
    }

    #[tokio::test]
    async fn dispatch_normalizes_then_delegates_to_the_provider() {
        let transport = DirectTransport::new(Arc::new(EchoProvider), dispatcher());
        let request = AgentRequest {
            agent: AgentContext {
                identifier: "a1".into(),
                name: "Agent".into(),
                description: String::new(),
                prompt: String::new(),
            },
            tools: vec![],
            servers: vec![],
            messages: vec![Message {
                sender: Sender { id: "u".into(), name: "User".into() },
                timestamp: chrono::Utc::now(),
                kind: MessageKind::Url,
                content: serde_json::json!("http://example.com"),
                metadata: None,
            }],
        };

        let resp = transport.dispatch(request).await.unwrap();
        assert_eq!(resp.content, serde_json::json!("[URL reference]: http://example.com"));
    }
}
