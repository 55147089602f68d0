//! The restrictions evaluator (spec §4.3): pure given an [`AgentConfig`] and
//! a [`ServerLookup`] for hash-to-identifier resolution.

use cubicler_config::AgentConfig;
use cubicler_naming::{parse, ParsedTool};
use cubicler_types::{ServerSummary, ToolDefinition};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestrictionError {
    #[error("malformed tool name: {0}")]
    MalformedToolName(String),
}

/// Resolves a server's hash token back to its snake_case identifier — the
/// provider repository implements this; the evaluator never sees hashes
/// otherwise.
pub trait ServerLookup {
    fn identifier_for_hash(&self, hash: &str) -> Option<String>;
}

/// Internal tools are always allowed unless explicitly restricted.
pub fn is_internal_tool_allowed(agent: &AgentConfig, snake_name: &str) -> bool {
    !agent.restricted_tools.iter().any(|t| t == snake_name)
}

/// Spec §4.3 "Server rule": allowlist (if non-empty) must contain the
/// identifier, and the denylist always wins.
pub fn is_server_allowed(agent: &AgentConfig, server_identifier: &str) -> bool {
    if agent
        .restricted_servers
        .iter()
        .any(|s| s == server_identifier)
    {
        return false;
    }
    if agent.allowed_servers.is_empty() {
        return true;
    }
    agent
        .allowed_servers
        .iter()
        .any(|s| s == server_identifier)
}

/// Spec §4.3 "Tool rule": resolve the owning server from the hash, apply the
/// server rule, then the `{server}.{function}` key against allow/deny lists.
pub fn is_tool_allowed(
    agent: &AgentConfig,
    tool_name: &str,
    servers: &dyn ServerLookup,
) -> Result<bool, RestrictionError> {
    match parse(tool_name).map_err(|e| RestrictionError::MalformedToolName(e.to_string()))? {
        ParsedTool::Internal { name } => Ok(is_internal_tool_allowed(agent, &name)),
        ParsedTool::External { token, function } => {
            let Some(server_identifier) = servers.identifier_for_hash(&token) else {
                return Ok(false);
            };
            if !is_server_allowed(agent, &server_identifier) {
                return Ok(false);
            }

            let key = format!("{server_identifier}.{function}");
            if agent.restricted_tools.iter().any(|t| *t == key) {
                return Ok(false);
            }
            if agent.allowed_tools.is_empty() {
                return Ok(true);
            }
            Ok(agent.allowed_tools.iter().any(|t| *t == key))
        }
    }
}

/// Batch-apply [`is_server_allowed`].
pub fn filter_allowed_servers(agent: &AgentConfig, servers: &[ServerSummary]) -> Vec<ServerSummary> {
    servers
        .iter()
        .filter(|s| is_server_allowed(agent, &s.identifier))
        .cloned()
        .collect()
}

/// Batch-apply [`is_tool_allowed`], silently dropping any tool name that
/// fails to parse rather than surfacing the error (callers filtering a list
/// of already-well-formed names should never hit this branch).
pub fn filter_allowed_tools(
    agent: &AgentConfig,
    tools: &[ToolDefinition],
    servers: &dyn ServerLookup,
) -> Vec<ToolDefinition> {
    tools
        .iter()
        .filter(|t| is_tool_allowed(agent, &t.name, servers).unwrap_or(false))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_config::AgentTransportConfig;
    use pretty_assertions::assert_eq;

    struct FakeLookup;
    impl ServerLookup for FakeLookup {
        fn identifier_for_hash(&self, hash: &str) -> Option<String> {
            match hash {
                "7f3c1a" => Some("wx".to_string()),
                _ => None,
            }
        }
    }

    fn agent(allowed_servers: Vec<&str>, restricted_servers: Vec<&str>) -> AgentConfig {
        AgentConfig {
            identifier: "a1".to_string(),
            name: "a1".to_string(),
            description: "".to_string(),
            prompt: None,
            transport: AgentTransportConfig::Http {
                url: "http://a:1".to_string(),
                headers: None,
                timeout_ms: None,
                auth: None,
            },
            allowed_servers: allowed_servers.into_iter().map(String::from).collect(),
            allowed_tools: vec![],
            restricted_servers: restricted_servers.into_iter().map(String::from).collect(),
            restricted_tools: vec![],
        }
    }

    #[test]
    fn allowed_servers_superset_is_allowed_and_restriction_wins() {
        let agent = agent(vec!["wx", "other"], vec![]);
        assert!(is_server_allowed(&agent, "wx"));

        let mut restricted = agent;
        restricted.restricted_servers.push("wx".to_string());
        assert!(!is_server_allowed(&restricted, "wx"));
    }

    #[test]
    fn empty_allowlist_permits_everything_unless_restricted() {
        let agent = agent(vec![], vec!["blocked"]);
        assert!(is_server_allowed(&agent, "wx"));
        assert!(!is_server_allowed(&agent, "blocked"));
    }

    #[test]
    fn internal_tools_allowed_unless_restricted() {
        let mut agent = agent(vec![], vec![]);
        assert!(is_internal_tool_allowed(&agent, "available_servers"));
        agent.restricted_tools.push("available_servers".to_string());
        assert!(!is_internal_tool_allowed(&agent, "available_servers"));
    }

    #[test]
    fn external_tool_requires_server_and_tool_allowed() {
        let lookup = FakeLookup;
        let mut agent = agent(vec![], vec![]);
        agent.restricted_tools.push("wx.get_current".to_string());
        assert!(!is_tool_allowed(&agent, "7f3c1a_get_current", &lookup).unwrap());
    }

    #[test]
    fn external_tool_with_unresolvable_hash_is_denied() {
        let lookup = FakeLookup;
        let agent = agent(vec![], vec![]);
        assert!(!is_tool_allowed(&agent, "000000_get_current", &lookup).unwrap());
    }

    #[test]
    fn malformed_name_is_an_error() {
        let lookup = FakeLookup;
        let agent = agent(vec![], vec![]);
        assert!(is_tool_allowed(&agent, "nosep", &lookup).is_err());
    }
}
