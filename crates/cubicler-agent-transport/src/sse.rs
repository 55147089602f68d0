use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cubicler_types::{AgentRequest, AgentResponse};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AgentTransportError;
use crate::{validate_response, AgentTransport};

/// One outbound event `cubicler-server` writes to an agent's SSE stream.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub id: String,
    pub event: &'static str,
    pub data: Value,
}

struct Pending {
    agent_id: String,
    resolver: oneshot::Sender<AgentResponse>,
}

/// Cubicler is the SSE *server* here (spec §4.8.2): agents connect to
/// `GET /mcp/sse`, register themselves, and `dispatch` pushes an
/// `agent_request` event down that connection and waits on a matching
/// `agent_response` posted back out of band.
pub struct SseAgentRegistry {
    connections: RwLock<HashMap<String, mpsc::Sender<SseEvent>>>,
    pending: RwLock<HashMap<String, Pending>>,
}

impl SseAgentRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a newly connected agent and returns the receiver the
    /// server's SSE handler should drain into the wire stream.
    pub async fn register_agent_connection(&self, agent_id: &str) -> mpsc::Receiver<SseEvent> {
        let (tx, rx) = mpsc::channel(32);
        self.connections.write().await.insert(agent_id.to_string(), tx);
        debug!(agent = agent_id, "agent sse connection registered");
        rx
    }

    /// Drops the connection and fails every request still parked on it.
    pub async fn disconnect(&self, agent_id: &str) {
        self.connections.write().await.remove(agent_id);
        let mut pending = self.pending.write().await;
        pending.retain(|_, p| p.agent_id != agent_id);
        debug!(agent = agent_id, "agent sse connection closed");
    }

    /// Resolves the dispatch waiting on `request_id`, called by the server's
    /// `POST /mcp` handler when the agent posts its `agent_response` back.
    pub async fn handle_agent_response(&self, request_id: &str, response: AgentResponse) {
        if let Some(pending) = self.pending.write().await.remove(request_id) {
            let _ = pending.resolver.send(response);
        } else {
            warn!(request_id, "agent response for unknown or expired request id");
        }
    }
}

impl Default for SseAgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SseAgentTransport {
    agent_id: String,
    registry: Arc<SseAgentRegistry>,
    response_timeout: Duration,
}

impl SseAgentTransport {
    pub fn new(agent_id: impl Into<String>, registry: Arc<SseAgentRegistry>, response_timeout: Duration) -> Self {
        Self {
            agent_id: agent_id.into(),
            registry,
            response_timeout,
        }
    }
}

#[async_trait]
impl AgentTransport for SseAgentTransport {
    async fn dispatch(&self, request: AgentRequest) -> Result<AgentResponse, AgentTransportError> {
        let sender = {
            let connections = self.registry.connections.read().await;
            connections.get(&self.agent_id).cloned()
        };
        let Some(sender) = sender else {
            return Err(AgentTransportError::Closed);
        };

        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.registry.pending.write().await.insert(
            request_id.clone(),
            Pending {
                agent_id: self.agent_id.clone(),
                resolver: tx,
            },
        );

        let event = SseEvent {
            id: request_id.clone(),
            event: "agent_request",
            data: serde_json::to_value(&request).map_err(|e| AgentTransportError::Malformed(e.to_string()))?,
        };
        if sender.send(event).await.is_err() {
            self.registry.pending.write().await.remove(&request_id);
            return Err(AgentTransportError::Closed);
        }

        match timeout(self.response_timeout, rx).await {
            Ok(Ok(response)) => {
                validate_response(&response)?;
                Ok(response)
            }
            Ok(Err(_)) => Err(AgentTransportError::Closed),
            Err(_) => {
                self.registry.pending.write().await.remove(&request_id);
                Err(AgentTransportError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_types::{AgentContext, MessageKind, ResponseMetadata};
    use pretty_assertions::assert_eq;

    fn sample_request() -> AgentRequest {
        AgentRequest {
            agent: AgentContext {
                identifier: "a1".into(),
                name: "Agent".into(),
                description: String::new(),
                prompt: "be helpful".into(),
            },
            tools: vec![],
            servers: vec![],
            messages: vec![],
        }
    }

    #[tokio::test]
    async fn dispatch_resolves_once_agent_posts_a_matching_response() {
        let registry = Arc::new(SseAgentRegistry::new());
        let mut rx = registry.register_agent_connection("a1").await;
        let transport = SseAgentTransport::new("a1", registry.clone(), Duration::from_secs(1));

        let handle = tokio::spawn(async move { transport.dispatch(sample_request()).await });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "agent_request");

        registry
            .handle_agent_response(
                &event.id,
                AgentResponse {
                    timestamp: chrono::Utc::now(),
                    kind: MessageKind::Text,
                    content: serde_json::json!("ack"),
                    metadata: ResponseMetadata::zero(),
                },
            )
            .await;

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.content, serde_json::json!("ack"));
    }

    #[tokio::test]
    async fn dispatch_without_a_connection_fails_closed() {
        let registry = Arc::new(SseAgentRegistry::new());
        let transport = SseAgentTransport::new("ghost", registry, Duration::from_secs(1));
        let err = transport.dispatch(sample_request()).await.unwrap_err();
        assert!(matches!(err, AgentTransportError::Closed));
    }

    #[tokio::test]
    async fn disconnect_fails_pending_requests_for_that_agent() {
        let registry = Arc::new(SseAgentRegistry::new());
        let mut rx = registry.register_agent_connection("a1").await;
        let transport = SseAgentTransport::new("a1", registry.clone(), Duration::from_secs(5));

        let handle = tokio::spawn(async move { transport.dispatch(sample_request()).await });
        let _event = rx.recv().await.unwrap();
        registry.disconnect("a1").await;

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, AgentTransportError::Closed));
    }
}
