//! The dispatch service (spec §4.1): the top-level orchestrator that turns a
//! `DispatchRequest` into a `DispatchResponse`, exactly one attempt per call.

mod error;
mod prompt;

pub use error::DispatchError;

use std::collections::HashMap;
use std::sync::Arc;

use cubicler_agent_transport::{create as create_transport, AgentTransport, DirectProvider, SseAgentRegistry};
use cubicler_config::{AgentsConfig, CachedConfig, Timeouts};
use cubicler_mcp_dispatcher::McpDispatcher;
use cubicler_provider_repo::ProviderRepository;
use cubicler_restrictions::{filter_allowed_servers, filter_allowed_tools};
use cubicler_types::{AgentContext, AgentRequest, DispatchRequest, DispatchResponse, Sender, ServerSummary};
use tokio::sync::RwLock;
use tracing::warn;

/// The top-level orchestrator. Long-lived per process: it caches one
/// transport handle per agent identifier, since a pooled stdio transport's
/// worker processes (and an SSE transport's registered connection) are
/// themselves long-lived — the dispatch service borrows the handle, it
/// doesn't own the per-call resource underneath it.
pub struct DispatchService {
    agents: CachedConfig<AgentsConfig>,
    repo: Arc<ProviderRepository>,
    mcp: Arc<McpDispatcher>,
    timeouts: Timeouts,
    sse_registry: Arc<SseAgentRegistry>,
    direct_providers: HashMap<String, Arc<dyn DirectProvider>>,
    transports: RwLock<HashMap<String, Arc<dyn AgentTransport>>>,
}

impl DispatchService {
    pub fn new(
        agents: CachedConfig<AgentsConfig>,
        repo: Arc<ProviderRepository>,
        mcp: Arc<McpDispatcher>,
        timeouts: Timeouts,
        sse_registry: Arc<SseAgentRegistry>,
        direct_providers: HashMap<String, Arc<dyn DirectProvider>>,
    ) -> Self {
        Self {
            agents,
            repo,
            mcp,
            timeouts,
            sse_registry,
            direct_providers,
            transports: RwLock::new(HashMap::new()),
        }
    }

    pub fn sse_registry(&self) -> &Arc<SseAgentRegistry> {
        &self.sse_registry
    }

    /// Exposes the current agents snapshot for `GET /agents`.
    pub async fn agents_config(&self) -> Result<Arc<AgentsConfig>, cubicler_config::ConfigError> {
        self.agents.get().await
    }

    /// Spec §4.1 algorithm, steps 1-2: validate the request and resolve the
    /// target `AgentConfig`, by id or (if none given) the first configured.
    async fn resolve_agent(&self, agent_id: Option<&str>) -> Result<cubicler_config::AgentConfig, DispatchError> {
        let config = self
            .agents
            .get()
            .await
            .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;

        match agent_id {
            Some(id) => config
                .agents
                .iter()
                .find(|a| a.identifier == id)
                .cloned()
                .ok_or_else(|| DispatchError::UnknownAgent(id.to_string())),
            None => config.agents.first().cloned().ok_or(DispatchError::NoAgents),
        }
    }

    async fn transport_for(&self, agent: &cubicler_config::AgentConfig) -> Result<Arc<dyn AgentTransport>, cubicler_agent_transport::AgentTransportError> {
        if let Some(existing) = self.transports.read().await.get(&agent.identifier) {
            return Ok(existing.clone());
        }

        let providers = &self.direct_providers;
        let lookup = |name: &str| providers.get(name).cloned();
        let transport = create_transport(agent, &self.timeouts, &self.sse_registry, &self.mcp, &lookup)?;

        self.transports
            .write()
            .await
            .insert(agent.identifier.clone(), transport.clone());
        Ok(transport)
    }

    /// Turn one `DispatchRequest` into a `DispatchResponse`. Fails outright
    /// only for the input-validation / agent-resolution errors named in
    /// spec §4.1; every error after that is shaped into the response itself.
    pub async fn dispatch(&self, agent_id: Option<&str>, request: DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        if request.messages.is_empty() {
            return Err(DispatchError::InvalidRequest("messages must be a non-empty sequence".to_string()));
        }

        let agent_config = self.resolve_agent(agent_id).await?;
        let sender = Sender {
            id: agent_config.identifier.clone(),
            name: agent_config.name.clone(),
        };

        match self.run_agent(&agent_config, request).await {
            Ok(resp) => Ok(DispatchResponse::from_agent_response(sender, resp)),
            Err(e) => {
                warn!(agent = %agent_config.identifier, error = %e, "dispatch failed after agent resolution");
                Ok(DispatchResponse::error(sender, e.to_string()))
            }
        }
    }

    /// Steps 3-7: gather context, build the request, dispatch, validate.
    /// Any failure here is caught by the caller and shaped per step 8.
    async fn run_agent(
        &self,
        agent_config: &cubicler_config::AgentConfig,
        request: DispatchRequest,
    ) -> Result<cubicler_types::AgentResponse, RunError> {
        let agents_config = self.agents.get().await.map_err(RunError::from_display)?;

        // The two independent context-gathering reads (spec §4.1 step 3)
        // run concurrently and are joined before anything downstream uses
        // them; prompt composition legitimately follows since it consumes
        // the resolved servers list.
        let (available, tools) = tokio::join!(
            self.mcp.call_tool("cubicler_available_servers", serde_json::json!({})),
            self.mcp.list_tools()
        );
        let available = available.map_err(RunError::from_display)?;
        let servers: Vec<ServerSummary> = serde_json::from_value(
            available
                .get("servers")
                .cloned()
                .unwrap_or(serde_json::Value::Array(vec![])),
        )
        .map_err(RunError::from_display)?;

        let prompt = prompt::compose(&agents_config, agent_config, &servers).await.map_err(RunError::from_display)?;

        let allowed_servers = filter_allowed_servers(agent_config, &servers);
        let allowed_tools = filter_allowed_tools(agent_config, &tools, self.repo.as_ref());

        let agent_request = AgentRequest {
            agent: AgentContext {
                identifier: agent_config.identifier.clone(),
                name: agent_config.name.clone(),
                description: agent_config.description.clone(),
                prompt,
            },
            tools: allowed_tools,
            servers: allowed_servers,
            messages: request.messages,
        };

        let transport = self.transport_for(agent_config).await.map_err(RunError::from_display)?;
        transport.dispatch(agent_request).await.map_err(RunError::from_display)
    }
}

/// A single string-flavored error for everything that can go wrong in steps
/// 3-7, so `run_agent` can use one `?`-friendly type without a combinatorial
/// `From` impl per source crate.
#[derive(Debug)]
struct RunError(String);

impl RunError {
    fn from_display(e: impl std::fmt::Display) -> Self {
        Self(e.to_string())
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RunError {}
