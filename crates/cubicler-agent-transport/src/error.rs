use thiserror::Error;

/// Failures a transport can surface back to the dispatch orchestrator
/// (spec §7: broker-boundary failures, never a raw panic).
#[derive(Debug, Error)]
pub enum AgentTransportError {
    #[error("agent call timed out")]
    Timeout,
    #[error("agent connection is closed")]
    Closed,
    #[error("agent pool is saturated")]
    PoolSaturated,
    #[error("agent returned an incomplete response: {0}")]
    IncompleteResponse(String),
    #[error("agent returned http status {status}: {reason}")]
    Upstream { status: u16, reason: String },
    #[error("malformed agent message: {0}")]
    Malformed(String),
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to spawn agent process: {0}")]
    Spawn(std::io::Error),
    #[error("agent process exited unexpectedly")]
    ProcessExited,
}
