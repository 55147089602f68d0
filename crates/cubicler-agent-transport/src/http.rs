use std::time::Duration;

use async_trait::async_trait;
use cubicler_types::{AgentRequest, AgentResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use tracing::warn;

use crate::error::AgentTransportError;
use crate::{validate_response, AgentTransport};

/// Spec §4.8.1: one POST per dispatch, no tool-callback servicing — the
/// agent is expected to reach `POST /mcp` on its own if it needs tools.
pub struct HttpAgentTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpAgentTransport {
    pub fn new(
        url: impl Into<String>,
        headers: Option<&std::collections::HashMap<String, String>>,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AgentTransportError> {
        let mut map = HeaderMap::new();
        for (name, value) in headers.into_iter().flatten() {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                map.insert(name, value);
            } else {
                warn!(header = name, "dropping malformed agent header");
            }
        }
        if let Some(token) = bearer {
            map.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| AgentTransportError::Malformed(e.to_string()))?,
            );
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(map)
            .build()?;

        Ok(Self { url: url.into(), client })
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn dispatch(&self, request: AgentRequest) -> Result<AgentResponse, AgentTransportError> {
        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(AgentTransportError::Upstream {
                status: status.as_u16(),
                reason,
            });
        }

        let agent_response: AgentResponse = response
            .json()
            .await
            .map_err(|e| AgentTransportError::Malformed(e.to_string()))?;
        validate_response(&agent_response)?;
        Ok(agent_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> AgentRequest {
        use cubicler_types::{AgentContext, Message, MessageKind, Sender};
        AgentRequest {
            agent: AgentContext {
                identifier: "a1".into(),
                name: "Agent".into(),
                description: String::new(),
                prompt: "be helpful".into(),
            },
            tools: vec![],
            servers: vec![],
            messages: vec![Message {
                sender: Sender { id: "u1".into(), name: "User".into() },
                timestamp: chrono::Utc::now(),
                kind: MessageKind::Text,
                content: serde_json::json!("hi"),
                metadata: None,
            }],
        }
    }

    #[tokio::test]
    async fn dispatch_round_trips_through_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "type": "text",
                "content": "hello back",
                "metadata": {"used_token": 3, "used_tools": 0},
            })))
            .mount(&server)
            .await;

        let transport = HttpAgentTransport::new(format!("{}/agent", server.uri()), None, None, Duration::from_secs(5)).unwrap();
        let resp = transport.dispatch(sample_request()).await.unwrap();
        assert_eq!(resp.content, serde_json::json!("hello back"));
    }

    #[tokio::test]
    async fn non_2xx_becomes_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let transport = HttpAgentTransport::new(format!("{}/agent", server.uri()), None, None, Duration::from_secs(5)).unwrap();
        let err = transport.dispatch(sample_request()).await.unwrap_err();
        assert!(matches!(err, AgentTransportError::Upstream { status: 500, .. }));
    }
}
