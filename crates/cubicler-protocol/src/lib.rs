//! MCP JSON-RPC 2.0 wire types and the [`ToolProvider`] contract that every
//! routable backend (internal tools, MCP providers, REST providers)
//! implements so the dispatcher can fan out without knowing concrete types.

mod error;
mod request_id;

pub use error::{McpError, ERROR_INTERNAL, ERROR_INVALID_REQUEST, ERROR_METHOD_NOT_FOUND, ERROR_SERVER};
pub use request_id::RequestId;

use async_trait::async_trait;
use cubicler_types::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A JSON-RPC 2.0 request, used both for broker -> provider and agent -> broker calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response: exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Anything that can answer `tools/list`, `tools/call` and say whether it
/// owns a given agent-visible tool name.
///
/// Implemented by the internal-tools service, the provider-MCP service and
/// the REST adapter; combined by `cubicler-mcp-dispatcher`.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn can_handle(&self, tool_name: &str) -> bool;

    async fn list_tools(&self) -> Vec<ToolDefinition>;

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, McpError>;
}
