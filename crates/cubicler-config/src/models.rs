use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pre-issued bearer token attached when the broker calls out to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtAuthConfig {
    pub token: String,
}

// ---------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptSpec {
    Inline { text: String },
    Source { source: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum AgentTransportConfig {
    Http {
        url: String,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        auth: Option<JwtAuthConfig>,
    },
    Sse {
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    Stdio {
        command: String,
        #[serde(default)]
        args: Option<Vec<String>>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        env: Option<HashMap<String, String>>,
        #[serde(default)]
        max_pool_size: Option<usize>,
        #[serde(default)]
        max_idle_time_ms: Option<u64>,
        #[serde(default)]
        queue_max_size: Option<usize>,
        #[serde(default)]
        queue_timeout_ms: Option<u64>,
        #[serde(default)]
        call_timeout_ms: Option<u64>,
    },
    Direct {
        provider: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        extra: Option<Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub identifier: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub prompt: Option<PromptSpec>,
    #[serde(flatten)]
    pub transport: AgentTransportConfig,
    #[serde(default)]
    pub allowed_servers: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub restricted_servers: Vec<String>,
    #[serde(default)]
    pub restricted_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub base_prompt: Option<String>,
    #[serde(default)]
    pub default_prompt: Option<String>,
    pub agents: Vec<AgentConfig>,
}

// ---------------------------------------------------------------------
// Providers (MCP + REST backends)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpServerTransportConfig {
    Http {
        url: String,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        auth: Option<JwtAuthConfig>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: Option<HashMap<String, String>>,
        #[serde(default)]
        auth: Option<JwtAuthConfig>,
    },
    Stdio {
        command: String,
        #[serde(default)]
        args: Option<Vec<String>>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        env: Option<HashMap<String, String>>,
    },
}

impl McpServerTransportConfig {
    /// The value hashed to derive the server's token: a URL for http/sse, the
    /// command line for stdio.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Http { url, .. } | Self::Sse { url, .. } => url.clone(),
            Self::Stdio { command, args, .. } => {
                let mut parts = vec![command.clone()];
                if let Some(args) = args {
                    parts.extend(args.iter().cloned());
                }
                parts.join(" ")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub transport: McpServerTransportConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParamSchema {
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestEndpoint {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub query: Option<ParamSchema>,
    #[serde(default)]
    pub payload: Option<ParamSchema>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Raw transform specs; parsed by `cubicler-rest-adapter` so this crate
    /// stays agnostic to transform semantics.
    #[serde(default)]
    pub response_transforms: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestServerConfig {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    #[serde(default)]
    pub default_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub auth: Option<JwtAuthConfig>,
    pub endpoints: Vec<RestEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub mcp_servers: Vec<McpServerEntry>,
    #[serde(default)]
    pub rest_servers: Vec<RestServerConfig>,
}

// ---------------------------------------------------------------------
// Webhooks (ambient, non-core — see SPEC_FULL.md §2.5)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub identifier: String,
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}
