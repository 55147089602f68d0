//! The internal tools service (spec §4.10): the two synthesized tools every
//! agent sees regardless of provider config, sourced from the provider
//! repository and fanned out across the other two provider services.

use std::sync::Arc;

use async_trait::async_trait;
use cubicler_naming::internal_tool_name;
use cubicler_protocol::{McpError, ToolProvider};
use cubicler_provider_repo::ProviderRepository;
use cubicler_types::ToolDefinition;
use serde_json::Value;

const TOOL_AVAILABLE_SERVERS: &str = "available_servers";
const TOOL_FETCH_SERVER_TOOLS: &str = "fetch_server_tools";
const SELF_IDENTIFIER: &str = "cubicler";

pub struct InternalToolsService {
    repo: Arc<ProviderRepository>,
    mcp: Arc<dyn ToolProvider>,
    rest: Arc<dyn ToolProvider>,
}

impl InternalToolsService {
    pub fn new(repo: Arc<ProviderRepository>, mcp: Arc<dyn ToolProvider>, rest: Arc<dyn ToolProvider>) -> Self {
        Self { repo, mcp, rest }
    }

    fn own_tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: internal_tool_name(TOOL_AVAILABLE_SERVERS),
                description: "List every configured server this broker knows about.".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDefinition {
                name: internal_tool_name(TOOL_FETCH_SERVER_TOOLS),
                description: "List the tools owned by a given server identifier.".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"server_identifier": {"type": "string"}},
                    "required": ["server_identifier"],
                }),
            },
        ]
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        Self::own_tools()
    }

    pub fn can_handle(&self, tool_name: &str) -> bool {
        matches!(
            cubicler_naming::parse(tool_name),
            Ok(cubicler_naming::ParsedTool::Internal { name })
                if name == TOOL_AVAILABLE_SERVERS || name == TOOL_FETCH_SERVER_TOOLS
        )
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, McpError> {
        let cubicler_naming::ParsedTool::Internal { name } = cubicler_naming::parse(tool_name)
            .map_err(|e| McpError::invalid_request(e.to_string()))?
        else {
            return Err(McpError::method_not_found(format!(
                "{tool_name} is not an internal tool"
            )));
        };

        match name.as_str() {
            TOOL_AVAILABLE_SERVERS => Ok(self.available_servers()),
            TOOL_FETCH_SERVER_TOOLS => self.fetch_server_tools(arguments).await,
            other => Err(McpError::method_not_found(format!("unknown internal tool: {other}"))),
        }
    }

    fn available_servers(&self) -> Value {
        let servers = self.repo.get_available_servers();
        serde_json::json!({ "total": servers.len(), "servers": servers })
    }

    async fn fetch_server_tools(&self, arguments: Value) -> Result<Value, McpError> {
        let identifier = arguments
            .get("server_identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_request("missing server_identifier"))?;

        if identifier == SELF_IDENTIFIER {
            return Ok(serde_json::json!({ "tools": Self::own_tools() }));
        }

        let metadata = self
            .repo
            .get_server_by_identifier(identifier)
            .ok_or_else(|| McpError::invalid_request(format!("unknown server identifier: {identifier}")))?;

        let prefix = format!("{}_", metadata.hash);
        let mut tools = self.mcp.list_tools().await;
        tools.extend(self.rest.list_tools().await);
        tools.retain(|t| t.name.starts_with(&prefix));

        Ok(serde_json::json!({ "tools": tools }))
    }
}

#[async_trait]
impl ToolProvider for InternalToolsService {
    async fn can_handle(&self, tool_name: &str) -> bool {
        InternalToolsService::can_handle(self, tool_name)
    }

    async fn list_tools(&self) -> Vec<ToolDefinition> {
        InternalToolsService::list_tools(self)
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, McpError> {
        InternalToolsService::call_tool(self, tool_name, arguments).await
    }
}
