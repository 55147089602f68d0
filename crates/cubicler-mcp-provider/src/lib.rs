//! The provider-MCP service (spec §4.5): owns one live [`McpTransport`] per
//! configured MCP server, fans `tools/list` out across all of them, and
//! routes `tools/call` back to the server a hash token was minted for.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cubicler_config::{McpServerEntry, Timeouts};
use cubicler_mcp_transport::{self as transport, McpTransport, TransportError};
use cubicler_naming::{parse, tool_name, ParsedTool};
use cubicler_protocol::{McpError, ToolProvider};
use cubicler_provider_repo::ProviderRepository;
use cubicler_restrictions::ServerLookup;
use cubicler_types::ToolDefinition;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Error)]
pub enum McpProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Fans requests out to every configured MCP provider server.
pub struct McpProviderService {
    entries: Vec<McpServerEntry>,
    repo: Arc<ProviderRepository>,
    transports: RwLock<HashMap<String, Arc<dyn McpTransport>>>,
    timeouts: Timeouts,
}

impl McpProviderService {
    pub fn new(entries: Vec<McpServerEntry>, repo: Arc<ProviderRepository>, timeouts: Timeouts) -> Self {
        Self {
            entries,
            repo,
            transports: RwLock::new(HashMap::new()),
            timeouts,
        }
    }

    fn entry_for(&self, identifier: &str) -> Option<&McpServerEntry> {
        self.entries.iter().find(|e| e.identifier == identifier)
    }

    /// Send `initialize` to every configured server. A server that fails is
    /// logged and left out of the transport map — `tools/list` simply
    /// contributes nothing for it, per the graceful-degradation requirement.
    pub async fn initialize_all(&self) {
        for entry in &self.entries {
            match self.spawn_and_initialize(entry).await {
                Ok(transport) => {
                    self.transports
                        .write()
                        .await
                        .insert(entry.identifier.clone(), transport);
                }
                Err(e) => {
                    warn!(server = %entry.identifier, error = %e, "mcp server failed to initialize, marking unavailable");
                }
            }
        }
    }

    async fn spawn_and_initialize(
        &self,
        entry: &McpServerEntry,
    ) -> Result<Arc<dyn McpTransport>, McpProviderError> {
        let built = transport::create(entry, self.timeouts.mcp_transport, self.timeouts.mcp_stop_grace)?;
        let built: Arc<dyn McpTransport> = Arc::from(built);
        built.initialize().await?;
        Ok(built)
    }

    /// Get the live transport for `identifier`, lazily creating and
    /// initializing one if it is missing (spec §4.5 `toolsCall`).
    async fn ensure_transport(
        &self,
        identifier: &str,
    ) -> Result<Arc<dyn McpTransport>, McpProviderError> {
        if let Some(existing) = self.transports.read().await.get(identifier) {
            return Ok(existing.clone());
        }

        let entry = self
            .entry_for(identifier)
            .ok_or(TransportError::Closed)?
            .clone();
        let built = self.spawn_and_initialize(&entry).await?;
        self.transports
            .write()
            .await
            .insert(identifier.to_string(), built.clone());
        Ok(built)
    }

    pub async fn list_tools(&self) -> Vec<ToolDefinition> {
        let snapshot: Vec<(String, Arc<dyn McpTransport>)> = self
            .transports
            .read()
            .await
            .iter()
            .map(|(id, t)| (id.clone(), t.clone()))
            .collect();

        let mut tools = Vec::new();
        for (identifier, transport) in snapshot {
            let Some(hash) = self.repo.get_server_hash(&identifier) else {
                continue;
            };
            match transport.request("tools/list", None).await {
                Ok(value) => {
                    let raw_tools = value
                        .get("tools")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    let count = raw_tools.len();
                    for raw in raw_tools {
                        let Some(name) = raw.get("name").and_then(Value::as_str) else {
                            continue;
                        };
                        let description = raw
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let parameters = raw
                            .get("inputSchema")
                            .cloned()
                            .unwrap_or_else(|| serde_json::json!({}));
                        tools.push(ToolDefinition {
                            name: tool_name(&hash, name),
                            description,
                            parameters,
                        });
                    }
                    self.repo.update_server_tool_count(&identifier, count);
                }
                Err(e) => {
                    warn!(server = %identifier, error = %e, "tools/list failed, excluding server's tools");
                }
            }
        }
        tools
    }

    pub fn can_handle(&self, tool_name: &str) -> bool {
        match parse(tool_name) {
            Ok(ParsedTool::External { token, .. }) => self
                .repo
                .identifier_for_hash(&token)
                .map(|id| self.entry_for(&id).is_some())
                .unwrap_or(false),
            _ => false,
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let ParsedTool::External { token, function } =
            parse(name).map_err(|e| McpError::invalid_request(e.to_string()))?
        else {
            return Err(McpError::method_not_found(format!(
                "{name} is not routed through the mcp provider service"
            )));
        };

        let identifier = self
            .repo
            .identifier_for_hash(&token)
            .ok_or_else(|| McpError::invalid_request(format!("unknown server token in {name}")))?;

        let transport = self
            .ensure_transport(&identifier)
            .await
            .map_err(|e| McpError::internal(e.to_string()))?;

        let params = serde_json::json!({ "name": function, "arguments": arguments });
        match transport.request("tools/call", Some(params)).await {
            Ok(value) => Ok(value),
            Err(TransportError::Upstream(mcp_err)) => Err(mcp_err),
            Err(e) => Err(McpError::internal(e.to_string())),
        }
    }
}

#[async_trait]
impl ToolProvider for McpProviderService {
    async fn can_handle(&self, tool_name: &str) -> bool {
        McpProviderService::can_handle(self, tool_name)
    }

    async fn list_tools(&self) -> Vec<ToolDefinition> {
        McpProviderService::list_tools(self).await
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, McpError> {
        McpProviderService::call_tool(self, tool_name, arguments).await
    }
}
