use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const ERROR_INVALID_REQUEST: i64 = -32600;
pub const ERROR_METHOD_NOT_FOUND: i64 = -32601;
pub const ERROR_INTERNAL: i64 = -32603;
pub const ERROR_SERVER: i64 = -32000;

/// A JSON-RPC 2.0 error object, and the error type providers return from
/// [`crate::ToolProvider`] so every failure reaches the agent as a structured
/// response rather than a broker-side panic (spec §7: "Propagation policy").
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ERROR_INVALID_REQUEST, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(ERROR_METHOD_NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ERROR_INTERNAL, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ERROR_SERVER, message)
    }
}
