//! The MCP dispatcher (spec §4.7): the single entrypoint that fans
//! `tools/list`/`tools/call` across the internal, provider-MCP and
//! provider-REST services, and answers `initialize` itself.

use std::sync::Arc;

use cubicler_protocol::{
    McpError, McpRequest, McpResponse, ToolProvider, ERROR_INVALID_REQUEST, ERROR_METHOD_NOT_FOUND,
    PROTOCOL_VERSION,
};
use cubicler_types::ToolDefinition;
use tracing::warn;

pub struct McpDispatcher {
    internal: Arc<dyn ToolProvider>,
    mcp: Arc<dyn ToolProvider>,
    rest: Arc<dyn ToolProvider>,
}

impl McpDispatcher {
    pub fn new(internal: Arc<dyn ToolProvider>, mcp: Arc<dyn ToolProvider>, rest: Arc<dyn ToolProvider>) -> Self {
        Self { internal, mcp, rest }
    }

    fn providers(&self) -> [&Arc<dyn ToolProvider>; 3] {
        [&self.internal, &self.mcp, &self.rest]
    }

    pub async fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        for provider in self.providers() {
            tools.extend(provider.list_tools().await);
        }
        tools
    }

    async fn find_provider(&self, tool_name: &str) -> Option<&Arc<dyn ToolProvider>> {
        for provider in self.providers() {
            if provider.can_handle(tool_name).await {
                return Some(provider);
            }
        }
        None
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, McpError> {
        match self.find_provider(tool_name).await {
            Some(provider) => provider.call_tool(tool_name, arguments).await,
            None => Err(McpError::method_not_found(format!("unknown tool: {tool_name}"))),
        }
    }

    /// Handle one JSON-RPC request end to end, never panicking: any
    /// unexpected failure becomes a `-32603` response (spec §4.7).
    pub async fn handle_request(&self, req: McpRequest) -> McpResponse {
        match req.method.as_str() {
            "initialize" => McpResponse::success(
                req.id,
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                }),
            ),
            "tools/list" => {
                let tools = self.list_tools().await;
                McpResponse::success(req.id, serde_json::json!({ "tools": tools }))
            }
            "tools/call" => self.handle_tools_call(req).await,
            other => {
                warn!(method = other, "unknown mcp method");
                McpResponse::failure(
                    req.id,
                    McpError::new(ERROR_METHOD_NOT_FOUND, format!("unknown method: {other}")),
                )
            }
        }
    }

    async fn handle_tools_call(&self, req: McpRequest) -> McpResponse {
        let params = req.params.clone().unwrap_or(serde_json::Value::Null);
        let Some(name) = params.get("name").and_then(serde_json::Value::as_str) else {
            return McpResponse::failure(
                req.id,
                McpError::new(ERROR_INVALID_REQUEST, "tools/call requires a string \"name\""),
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or(serde_json::json!({}));

        match self.call_tool(name, arguments).await {
            Ok(result) => McpResponse::success(req.id, result),
            Err(err) => McpResponse::failure(req.id, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct StubProvider {
        prefix: &'static str,
    }

    #[async_trait]
    impl ToolProvider for StubProvider {
        async fn can_handle(&self, tool_name: &str) -> bool {
            tool_name.starts_with(self.prefix)
        }
        async fn list_tools(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition {
                name: format!("{}_tool", self.prefix),
                description: String::new(),
                parameters: serde_json::json!({}),
            }]
        }
        async fn call_tool(&self, tool_name: &str, _arguments: serde_json::Value) -> Result<serde_json::Value, McpError> {
            Ok(serde_json::json!({ "handled_by": self.prefix, "name": tool_name }))
        }
    }

    fn dispatcher() -> McpDispatcher {
        McpDispatcher::new(
            Arc::new(StubProvider { prefix: "cubicler" }),
            Arc::new(StubProvider { prefix: "abc123" }),
            Arc::new(StubProvider { prefix: "def456" }),
        )
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let req = McpRequest::new(cubicler_protocol::RequestId::from(1i64), "initialize", None);
        let resp = dispatcher().handle_request(req).await;
        assert_eq!(
            resp.result.unwrap().get("protocolVersion").unwrap(),
            &serde_json::json!(PROTOCOL_VERSION)
        );
    }

    #[tokio::test]
    async fn tools_list_aggregates_all_three_providers() {
        let req = McpRequest::new(cubicler_protocol::RequestId::from(1i64), "tools/list", None);
        let resp = dispatcher().handle_request(req).await;
        let tools = resp.result.unwrap().get("tools").unwrap().as_array().unwrap().len();
        assert_eq!(tools, 3);
    }

    #[tokio::test]
    async fn tools_call_routes_by_can_handle() {
        let req = McpRequest::new(
            cubicler_protocol::RequestId::from(1i64),
            "tools/call",
            Some(serde_json::json!({"name": "abc123_get", "arguments": {}})),
        );
        let resp = dispatcher().handle_request(req).await;
        assert_eq!(resp.result.unwrap().get("handled_by").unwrap(), &serde_json::json!("abc123"));
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let req = McpRequest::new(
            cubicler_protocol::RequestId::from(1i64),
            "tools/call",
            Some(serde_json::json!({"name": "nope_get", "arguments": {}})),
        );
        let resp = dispatcher().handle_request(req).await;
        assert_eq!(resp.error.unwrap().code, ERROR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let req = McpRequest::new(cubicler_protocol::RequestId::from(1i64), "bogus", None);
        let resp = dispatcher().handle_request(req).await;
        assert_eq!(resp.error.unwrap().code, ERROR_METHOD_NOT_FOUND);
    }
}
