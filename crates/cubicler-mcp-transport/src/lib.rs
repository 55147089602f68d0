//! Transports that carry MCP JSON-RPC to a provider backend (spec §4.9):
//! a plain request/response HTTP transport, an SSE transport with
//! out-of-band correlated responses, and a stdio transport over a spawned
//! child process.

mod error;
mod factory;
mod http;
mod sse;
mod stdio;

pub use error::TransportError;
pub use factory::create;
pub use http::HttpMcpTransport;
pub use sse::SseMcpTransport;
pub use stdio::StdioMcpTransport;

use async_trait::async_trait;
use serde_json::Value;

/// One live connection to an MCP provider server, abstracting over how
/// requests physically travel (http/sse/stdio).
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send the MCP `initialize` handshake. Must be called once before any
    /// other request.
    async fn initialize(&self) -> Result<(), TransportError>;

    /// Send a JSON-RPC request and await its matching response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError>;

    /// Tear the transport down, releasing any background tasks or processes.
    async fn close(&self);

    fn server_identifier(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_config::{JwtAuthConfig, McpServerEntry, McpServerTransportConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_transport_round_trips_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": "whatever",
                "result": {"tools": []}
            })))
            .mount(&server)
            .await;

        let entry = McpServerEntry {
            identifier: "wx".to_string(),
            name: "Weather".to_string(),
            description: String::new(),
            transport: McpServerTransportConfig::Http {
                url: format!("{}/mcp", server.uri()),
                headers: None,
                auth: Some(JwtAuthConfig {
                    token: "abc".to_string(),
                }),
            },
        };

        let transport = create(&entry, Duration::from_secs(5), Duration::from_secs(1)).unwrap();
        let result = transport.request("tools/list", None).await.unwrap();
        assert_eq!(result, json!({"tools": []}));
        assert_eq!(transport.server_identifier(), "wx");
    }

    #[tokio::test]
    async fn http_transport_surfaces_upstream_error_as_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": "whatever",
                "error": {"code": -32000, "message": "boom"}
            })))
            .mount(&server)
            .await;

        let entry = McpServerEntry {
            identifier: "wx".to_string(),
            name: "Weather".to_string(),
            description: String::new(),
            transport: McpServerTransportConfig::Http {
                url: format!("{}/mcp", server.uri()),
                headers: None,
                auth: None,
            },
        };

        let transport = create(&entry, Duration::from_secs(5), Duration::from_secs(1)).unwrap();
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, TransportError::Upstream(e) if e.message == "boom" && e.code == -32000));
    }
}
