//! Configuration models and loading for Cubicler.
//!
//! Per spec §1, *sourcing* config (files vs URLs, prompt templating) is an
//! external collaborator — only the shapes in §3 and the env-substitution
//! contract in §6 are load-bearing for the core. This crate supplies a
//! minimal, real implementation of that loading so the rest of the
//! workspace has something concrete to run against.

mod cache;
mod env_subst;
mod error;
mod models;
mod source;
mod timeouts;
mod validation;

pub use cache::CachedConfig;
pub use env_subst::substitute_env;
pub use error::ConfigError;
pub use models::{
    AgentConfig, AgentTransportConfig, AgentsConfig, HttpMethod, JwtAuthConfig, McpServerEntry,
    McpServerTransportConfig, ParamSchema, PromptSpec, ProvidersConfig, RestEndpoint,
    RestServerConfig, WebhookConfig, WebhooksConfig,
};
pub use source::{source_from_env_value, ConfigSource, FileSource, UrlSource};
pub use timeouts::{strict_params_enabled, Timeouts};
pub use validation::{validate_agents_config, validate_identifier, validate_providers_config};

use std::time::Duration;

/// Default TTL for cached config snapshots, overridable per call site.
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(30);

/// Environment variable names naming each config source (spec §6).
pub const ENV_AGENTS_PATH: &str = "CUBICLER_AGENTS_PATH";
pub const ENV_PROVIDERS_PATH: &str = "CUBICLER_PROVIDERS_PATH";
pub const ENV_WEBHOOKS_PATH: &str = "CUBICLER_WEBHOOKS_PATH";
