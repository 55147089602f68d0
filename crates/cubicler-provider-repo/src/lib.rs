//! The provider repository (spec §4.4): the single source of truth for
//! server metadata, derived from [`ProvidersConfig`] and re-derived only
//! when the config's content digest changes.

use std::collections::HashMap;
use std::sync::RwLock;

use cubicler_config::{validate_providers_config, CachedConfig, ConfigError, ProvidersConfig};
use cubicler_naming::hash;
use cubicler_restrictions::ServerLookup;
use cubicler_types::{ServerKind, ServerMetadata, ServerSummary};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct State {
    digest: String,
    servers: Vec<ServerMetadata>,
    by_identifier: HashMap<String, usize>,
    by_hash: HashMap<String, usize>,
}

impl State {
    fn empty() -> Self {
        Self {
            digest: String::new(),
            servers: Vec::new(),
            by_identifier: HashMap::new(),
            by_hash: HashMap::new(),
        }
    }
}

fn digest_of(cfg: &ProvidersConfig) -> String {
    let canonical = serde_json::to_vec(cfg).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn derive_metadata(cfg: &ProvidersConfig) -> Vec<ServerMetadata> {
    let mut servers = Vec::with_capacity(cfg.mcp_servers.len() + cfg.rest_servers.len());
    let mut index = 0usize;

    for entry in &cfg.mcp_servers {
        let endpoint = entry.transport.endpoint();
        servers.push(ServerMetadata {
            identifier: entry.identifier.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            hash: hash(&entry.identifier, &endpoint),
            endpoint,
            tools_count: 0,
            kind: ServerKind::Mcp,
            index,
        });
        index += 1;
    }

    for entry in &cfg.rest_servers {
        servers.push(ServerMetadata {
            identifier: entry.identifier.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            hash: hash(&entry.identifier, &entry.base_url),
            endpoint: entry.base_url.clone(),
            tools_count: entry.endpoints.len(),
            kind: ServerKind::Rest,
            index,
        });
        index += 1;
    }

    servers
}

/// Owns cached, derived [`ServerMetadata`] for every configured server.
pub struct ProviderRepository {
    config: CachedConfig<ProvidersConfig>,
    state: RwLock<State>,
}

impl ProviderRepository {
    pub fn new(config: CachedConfig<ProvidersConfig>) -> Self {
        Self {
            config,
            state: RwLock::new(State::empty()),
        }
    }

    /// Fetch the current config snapshot and regenerate derived metadata
    /// only if its content digest changed since the last accepted one.
    pub async fn refresh(&self) -> Result<(), ProviderError> {
        let cfg = self.config.get().await?;
        validate_providers_config(&cfg).map_err(ConfigError::from)?;
        let digest = digest_of(&cfg);

        let needs_rebuild = {
            let state = self.state.read().expect("provider repo lock poisoned");
            state.digest != digest
        };

        if needs_rebuild {
            let servers = derive_metadata(&cfg);
            let by_identifier = servers
                .iter()
                .enumerate()
                .map(|(i, s)| (s.identifier.clone(), i))
                .collect();
            let by_hash = servers
                .iter()
                .enumerate()
                .map(|(i, s)| (s.hash.clone(), i))
                .collect();

            let mut state = self.state.write().expect("provider repo lock poisoned");
            // Another writer may have raced us to the same digest; last one wins,
            // which is fine since both derive from the same accepted config.
            state.digest = digest;
            state.servers = servers;
            state.by_identifier = by_identifier;
            state.by_hash = by_hash;
            debug!("provider repository metadata regenerated");
        }

        Ok(())
    }

    pub fn get_server_by_identifier(&self, identifier: &str) -> Option<ServerMetadata> {
        let state = self.state.read().expect("provider repo lock poisoned");
        state
            .by_identifier
            .get(identifier)
            .map(|&i| state.servers[i].clone())
    }

    pub fn get_server_hash(&self, identifier: &str) -> Option<String> {
        self.get_server_by_identifier(identifier).map(|s| s.hash)
    }

    pub fn get_available_servers(&self) -> Vec<ServerSummary> {
        let state = self.state.read().expect("provider repo lock poisoned");
        state.servers.iter().map(ServerSummary::from).collect()
    }

    pub fn get_all_metadata(&self) -> Vec<ServerMetadata> {
        let state = self.state.read().expect("provider repo lock poisoned");
        state.servers.clone()
    }

    /// Called by the provider-MCP service after a successful `tools/list`.
    pub fn update_server_tool_count(&self, identifier: &str, count: usize) {
        let mut state = self.state.write().expect("provider repo lock poisoned");
        if let Some(&i) = state.by_identifier.get(identifier) {
            state.servers[i].tools_count = count;
        }
    }
}

impl ServerLookup for ProviderRepository {
    fn identifier_for_hash(&self, hash: &str) -> Option<String> {
        let state = self.state.read().expect("provider repo lock poisoned");
        state.by_hash.get(hash).map(|&i| state.servers[i].identifier.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_config::source_from_env_value;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{json}").unwrap();
        f
    }

    #[tokio::test]
    async fn assigns_mcp_servers_before_rest_and_stable_hashes() {
        let json = r#"{
            "mcp_servers": [{"identifier":"wx","name":"Weather","transport":"http","url":"http://wx:9"}],
            "rest_servers": [{"identifier":"billing","name":"Billing","base_url":"http://billing","endpoints":[]}]
        }"#;
        let file = write_config(json);
        let source = source_from_env_value(file.path().to_str().unwrap());
        let cache = CachedConfig::new(source, Duration::from_secs(60));
        let repo = ProviderRepository::new(cache);
        repo.refresh().await.unwrap();

        let wx = repo.get_server_by_identifier("wx").unwrap();
        assert_eq!(wx.index, 0);
        assert_eq!(wx.kind, ServerKind::Mcp);

        let billing = repo.get_server_by_identifier("billing").unwrap();
        assert_eq!(billing.index, 1);
        assert_eq!(billing.kind, ServerKind::Rest);

        assert_eq!(repo.identifier_for_hash(&wx.hash).unwrap(), "wx");
    }

    #[tokio::test]
    async fn update_tool_count_is_reflected_in_available_servers() {
        let json = r#"{"mcp_servers":[{"identifier":"wx","name":"Weather","transport":"http","url":"http://wx:9"}],"rest_servers":[]}"#;
        let file = write_config(json);
        let source = source_from_env_value(file.path().to_str().unwrap());
        let cache = CachedConfig::new(source, Duration::from_secs(60));
        let repo = ProviderRepository::new(cache);
        repo.refresh().await.unwrap();

        repo.update_server_tool_count("wx", 5);
        let summary = repo
            .get_available_servers()
            .into_iter()
            .find(|s| s.identifier == "wx")
            .unwrap();
        assert_eq!(summary.tools_count, 5);
    }
}
