use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ConfigError;

/// Where raw, pre-substitution config JSON comes from. The broker's own
/// wiring decides which source to use per environment variable (spec §6);
/// Cubicler's core never cares which it got.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load_raw(&self) -> Result<String, ConfigError>;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn load_raw(&self) -> Result<String, ConfigError> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

pub struct UrlSource {
    url: String,
    client: reqwest::Client,
}

impl UrlSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ConfigSource for UrlSource {
    async fn load_raw(&self) -> Result<String, ConfigError> {
        let resp = self.client.get(&self.url).send().await?;
        Ok(resp.error_for_status()?.text().await?)
    }
}

/// Build the right [`ConfigSource`] for an environment-variable value: a
/// `http(s)://` value loads over the network, anything else is a file path.
pub fn source_from_env_value(value: &str) -> Box<dyn ConfigSource> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Box::new(UrlSource::new(value))
    } else {
        Box::new(FileSource::new(value))
    }
}
