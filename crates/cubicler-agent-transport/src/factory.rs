use std::sync::Arc;
use std::time::Duration;

use cubicler_config::{AgentConfig, AgentTransportConfig, Timeouts};
use cubicler_mcp_dispatcher::McpDispatcher;

use crate::direct::DirectProvider;
use crate::error::AgentTransportError;
use crate::sse::SseAgentRegistry;
use crate::{AgentTransport, DirectTransport, HttpAgentTransport, SseAgentTransport, StdioAgentTransport};

/// Builds the transport named by an agent's config (spec §4.8). The SSE and
/// Direct variants need state the dispatch orchestrator owns for the life of
/// the process (the connection registry, the provider registry), so those
/// are passed in rather than constructed here.
pub fn create(
    agent: &AgentConfig,
    timeouts: &Timeouts,
    sse_registry: &Arc<SseAgentRegistry>,
    dispatcher: &Arc<McpDispatcher>,
    direct_providers: &dyn Fn(&str) -> Option<Arc<dyn DirectProvider>>,
) -> Result<Arc<dyn AgentTransport>, AgentTransportError> {
    match &agent.transport {
        AgentTransportConfig::Http { url, headers, timeout_ms, auth } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(timeouts.agent_call);
            let bearer = auth.as_ref().map(|a| a.token.as_str());
            let transport = HttpAgentTransport::new(url, headers.as_ref(), bearer, timeout)?;
            Ok(Arc::new(transport))
        }
        AgentTransportConfig::Sse { timeout_ms } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(timeouts.sse_response);
            Ok(Arc::new(SseAgentTransport::new(agent.identifier.clone(), sse_registry.clone(), timeout)))
        }
        AgentTransportConfig::Stdio {
            command,
            args,
            cwd,
            env,
            max_pool_size,
            max_idle_time_ms,
            queue_max_size,
            queue_timeout_ms,
            call_timeout_ms,
        } => {
            let transport = StdioAgentTransport::new(
                command,
                args.clone().unwrap_or_default(),
                cwd.clone(),
                env.clone(),
                max_pool_size.unwrap_or(4),
                max_idle_time_ms.map(Duration::from_millis).unwrap_or(Duration::from_secs(300)),
                queue_max_size.unwrap_or(100),
                queue_timeout_ms.map(Duration::from_millis).unwrap_or(timeouts.stdio_queue_wait),
                call_timeout_ms.map(Duration::from_millis).unwrap_or(timeouts.agent_call),
                timeouts.agent_stop_grace,
                dispatcher.clone(),
            )?;
            Ok(Arc::new(transport))
        }
        AgentTransportConfig::Direct { provider, .. } => {
            let backend = direct_providers(provider).ok_or_else(|| {
                AgentTransportError::Malformed(format!("no direct provider registered for {provider}"))
            })?;
            Ok(Arc::new(DirectTransport::new(backend, dispatcher.clone())))
        }
    }
}
