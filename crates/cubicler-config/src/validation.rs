use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::models::{AgentConfig, AgentsConfig, McpServerEntry, ProvidersConfig, RestServerConfig};

const MAX_IDENTIFIER_LEN: usize = 32;

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid regex"))
}

pub fn validate_identifier(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN || !identifier_pattern().is_match(id) {
        return Err(ConfigError::Validation(format!(
            "invalid identifier '{id}': must be lowercase [a-z0-9_-]+, <= {MAX_IDENTIFIER_LEN} chars"
        )));
    }
    Ok(())
}

fn check_unique(ids: impl Iterator<Item = String>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate identifier '{id}'"
            )));
        }
    }
    Ok(())
}

pub fn validate_agents_config(cfg: &AgentsConfig) -> Result<(), ConfigError> {
    if cfg.agents.is_empty() {
        return Err(ConfigError::Validation(
            "agents config must list at least one agent".to_string(),
        ));
    }
    for agent in &cfg.agents {
        validate_agent(agent)?;
    }
    check_unique(cfg.agents.iter().map(|a| a.identifier.clone()))
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    validate_identifier(&agent.identifier)
}

pub fn validate_providers_config(cfg: &ProvidersConfig) -> Result<(), ConfigError> {
    for server in &cfg.mcp_servers {
        validate_mcp_server(server)?;
    }
    for server in &cfg.rest_servers {
        validate_rest_server(server)?;
    }
    check_unique(
        cfg.mcp_servers
            .iter()
            .map(|s| s.identifier.clone())
            .chain(cfg.rest_servers.iter().map(|s| s.identifier.clone())),
    )
}

fn validate_mcp_server(server: &McpServerEntry) -> Result<(), ConfigError> {
    validate_identifier(&server.identifier)
}

fn validate_rest_server(server: &RestServerConfig) -> Result<(), ConfigError> {
    validate_identifier(&server.identifier)?;
    let mut seen = HashSet::new();
    for endpoint in &server.endpoints {
        if !seen.insert(endpoint.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate endpoint name '{}' on server '{}'",
                endpoint.name, server.identifier
            )));
        }
    }
    Ok(())
}
