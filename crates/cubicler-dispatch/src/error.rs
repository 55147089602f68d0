use thiserror::Error;

/// Failures that stop dispatch before an agent has been resolved (spec
/// §4.1): everything after agent resolution is instead shaped into an
/// error `DispatchResponse` (step 8), never surfaced as this type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("no agents are configured")]
    NoAgents,
}
