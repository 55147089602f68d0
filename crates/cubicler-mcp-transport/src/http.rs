use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cubicler_protocol::{McpRequest, McpResponse, RequestId};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use crate::error::TransportError;
use crate::McpTransport;

/// Request/response MCP over a single HTTP endpoint: one POST per call, no
/// persistent connection to keep alive.
pub struct HttpMcpTransport {
    identifier: String,
    url: String,
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpMcpTransport {
    pub fn new(
        identifier: impl Into<String>,
        url: impl Into<String>,
        headers: Option<&HashMap<String, String>>,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut header_map = build_header_map(headers);
        if let Some(token) = bearer {
            header_map.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| TransportError::Malformed(e.to_string()))?,
            );
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            identifier: identifier.into(),
            url: url.into(),
            client,
            headers: header_map,
        })
    }
}

pub(crate) fn build_header_map(headers: Option<&HashMap<String, String>>) -> HeaderMap {
    let mut map = HeaderMap::new();
    if let Some(headers) = headers {
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                map.insert(name, value);
            }
        }
    }
    map
}

#[async_trait]
impl McpTransport for HttpMcpTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        self.request("initialize", Some(serde_json::json!({}))).await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let id = RequestId::from(Uuid::new_v4().to_string());
        let req = McpRequest::new(id, method, params);
        trace!(server = %self.identifier, method, "sending mcp http request");

        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<McpResponse>()
            .await?;

        match resp.result {
            Some(value) => Ok(value),
            None => Err(TransportError::Upstream(resp.error.unwrap_or_else(|| {
                cubicler_protocol::McpError::internal("provider returned no result")
            }))),
        }
    }

    async fn close(&self) {}

    fn server_identifier(&self) -> &str {
        &self.identifier
    }
}
