use cubicler_protocol::McpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("request timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to spawn stdio process: {0}")]
    Spawn(std::io::Error),

    #[error("stdio process exited before responding")]
    ProcessExited,

    #[error("malformed message from provider: {0}")]
    Malformed(String),

    /// The provider answered with a well-formed JSON-RPC error object —
    /// distinct from a transport failure so callers can propagate the
    /// backend's own code/message instead of collapsing it to -32603.
    #[error("upstream error: {0}")]
    Upstream(McpError),
}
