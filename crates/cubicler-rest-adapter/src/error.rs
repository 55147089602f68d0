use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestAdapterError {
    #[error("unknown server or endpoint for tool name")]
    UnknownTool,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {reason}")]
    Upstream { status: u16, reason: String },

    #[error(transparent)]
    Transform(#[from] crate::transform::TransformError),

    #[error("malformed arguments: {0}")]
    MalformedArguments(String),
}
