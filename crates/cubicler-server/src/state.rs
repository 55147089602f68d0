use std::sync::Arc;

use cubicler_agent_transport::SseAgentRegistry;
use cubicler_auth::JwtVerifier;
use cubicler_dispatch::DispatchService;
use cubicler_mcp_dispatcher::McpDispatcher;
use cubicler_provider_repo::ProviderRepository;

/// Everything a handler needs, constructed once by the composition root and
/// cloned cheaply (every field is an `Arc`) into each request.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<DispatchService>,
    pub mcp: Arc<McpDispatcher>,
    pub repo: Arc<ProviderRepository>,
    pub sse: Arc<SseAgentRegistry>,
    pub auth: Option<Arc<JwtVerifier>>,
}
