use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch config from URL: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
