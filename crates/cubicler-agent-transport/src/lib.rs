//! Agent transports (spec §4.8): four ways to carry one `AgentRequest` out to
//! an agent process and bring its `AgentResponse` back. `cubicler-dispatch`
//! picks one per agent via [`factory::create`] and calls [`AgentTransport::dispatch`].

mod direct;
mod error;
mod factory;
mod http;
mod sse;
mod stdio;

pub use direct::{DirectProvider, DirectTransport};
pub use error::AgentTransportError;
pub use factory::create;
pub use http::HttpAgentTransport;
pub use sse::{SseAgentRegistry, SseAgentTransport};
pub use stdio::StdioAgentTransport;

use async_trait::async_trait;
use cubicler_types::{AgentRequest, AgentResponse};

/// One agent, reachable by exactly one of the four transports configured
/// for it. Implementations never panic: every failure mode becomes an
/// [`AgentTransportError`] so the orchestrator can build the error-shaped
/// `DispatchResponse` described in spec §4.1 step 8.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn dispatch(&self, request: AgentRequest) -> Result<AgentResponse, AgentTransportError>;
}

/// Spec §4.1 step 7: a transport that returned `Ok` must still have filled in
/// every required field before the orchestrator trusts it.
pub(crate) fn validate_response(resp: &AgentResponse) -> Result<(), AgentTransportError> {
    use cubicler_types::MessageKind;
    if resp.kind != MessageKind::Null && resp.content.is_null() {
        return Err(AgentTransportError::IncompleteResponse(
            "content is null for a non-null response type".to_string(),
        ));
    }
    Ok(())
}
