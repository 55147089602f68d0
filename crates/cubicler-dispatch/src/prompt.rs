//! Prompt composition (spec §2: "resolves base + default + agent-specific
//! prompt fragments, appending a machine-generated 'available servers'
//! section filtered by agent restrictions"). Sourcing config itself is an
//! external collaborator's job, but resolving a `PromptSpec::Source` still
//! needs *some* way to fetch bytes, so this reuses `cubicler_config`'s own
//! file/URL source abstraction rather than inventing a parallel one.

use cubicler_config::{source_from_env_value, AgentConfig, AgentsConfig, ConfigSource, PromptSpec};
use cubicler_types::ServerSummary;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to load prompt source: {0}")]
    Source(#[from] cubicler_config::ConfigError),
}

async fn resolve_fragment(spec: &Option<PromptSpec>) -> Result<Option<String>, PromptError> {
    match spec {
        None => Ok(None),
        Some(PromptSpec::Inline { text }) => Ok(Some(text.clone())),
        Some(PromptSpec::Source { source }) => {
            let loaded = source_from_env_value(source).load_raw().await?;
            Ok(Some(loaded))
        }
    }
}

/// Joins `basePrompt`, `defaultPrompt` (only when `agent` has no prompt of
/// its own — it's the fallback, not an always-on fragment), the agent's own
/// prompt, and the server summary section, each on its own blank-line-
/// separated paragraph.
pub async fn compose(agents: &AgentsConfig, agent: &AgentConfig, servers: &[ServerSummary]) -> Result<String, PromptError> {
    let mut fragments = Vec::new();

    if let Some(base) = &agents.base_prompt {
        fragments.push(base.clone());
    }

    match resolve_fragment(&agent.prompt).await? {
        Some(text) => fragments.push(text),
        None => {
            if let Some(default) = &agents.default_prompt {
                fragments.push(default.clone());
            }
        }
    }

    fragments.push(render_servers_section(servers));

    Ok(fragments.join("\n\n"))
}

fn render_servers_section(servers: &[ServerSummary]) -> String {
    if servers.is_empty() {
        return "Available servers: none.".to_string();
    }
    let mut section = String::from("Available servers:\n");
    for server in servers {
        section.push_str(&format!(
            "- {} ({} tools): {}\n",
            server.identifier, server.tools_count, server.description
        ));
    }
    section.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_config::AgentTransportConfig;
    use pretty_assertions::assert_eq;

    fn agent(prompt: Option<PromptSpec>) -> AgentConfig {
        AgentConfig {
            identifier: "a1".to_string(),
            name: "Agent One".to_string(),
            description: String::new(),
            prompt,
            transport: AgentTransportConfig::Http {
                url: "http://a:1".to_string(),
                headers: None,
                timeout_ms: None,
                auth: None,
            },
            allowed_servers: vec![],
            allowed_tools: vec![],
            restricted_servers: vec![],
            restricted_tools: vec![],
        }
    }

    #[tokio::test]
    async fn default_prompt_is_used_only_when_agent_has_none() {
        let agents = AgentsConfig {
            base_prompt: Some("base".to_string()),
            default_prompt: Some("default".to_string()),
            agents: vec![],
        };

        let without = compose(&agents, &agent(None), &[]).await.unwrap();
        assert!(without.contains("base"));
        assert!(without.contains("default"));

        let with_own = compose(&agents, &agent(Some(PromptSpec::Inline { text: "mine".to_string() })), &[])
            .await
            .unwrap();
        assert!(with_own.contains("mine"));
        assert!(!with_own.contains("default"));
    }

    #[tokio::test]
    async fn servers_section_lists_each_server() {
        let agents = AgentsConfig::default();
        let servers = vec![ServerSummary {
            identifier: "wx".to_string(),
            name: "Weather".to_string(),
            description: "weather lookups".to_string(),
            tools_count: 2,
        }];
        let composed = compose(&agents, &agent(None), &servers).await.unwrap();
        assert!(composed.contains("wx (2 tools): weather lookups"));
    }

    #[tokio::test]
    async fn no_servers_renders_explicit_none() {
        let agents = AgentsConfig::default();
        let composed = compose(&agents, &agent(None), &[]).await.unwrap();
        assert!(composed.contains("Available servers: none."));
    }
}
