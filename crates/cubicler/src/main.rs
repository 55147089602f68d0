//! Composition root: wires the configuration layer, the provider services,
//! the dispatch pipeline and the HTTP surface into one running broker.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cubicler_agent_transport::SseAgentRegistry;
use cubicler_auth::JwtVerifier;
use cubicler_config::{
    source_from_env_value, strict_params_enabled, CachedConfig, ProvidersConfig, Timeouts, DEFAULT_CONFIG_TTL,
};
use cubicler_dispatch::DispatchService;
use cubicler_internal_tools::InternalToolsService;
use cubicler_mcp_dispatcher::McpDispatcher;
use cubicler_mcp_provider::McpProviderService;
use cubicler_protocol::ToolProvider;
use cubicler_provider_repo::ProviderRepository;
use cubicler_rest_adapter::RestAdapterService;
use cubicler_server::{build_router, AppState};
use jsonwebtoken::Algorithm;
use tracing::{info, warn};

/// Cubicler: an orchestration broker between conversational agents and MCP/REST tool backends.
#[derive(Parser, Debug)]
#[command(name = "cubicler", version, about)]
struct Args {
    /// Address to bind the HTTP surface to.
    #[arg(long, env = "CUBICLER_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Agents config source (file path or URL). Falls back to CUBICLER_AGENTS_PATH.
    #[arg(long, env = "CUBICLER_AGENTS_PATH")]
    agents: Option<String>,

    /// Providers config source (file path or URL). Falls back to CUBICLER_PROVIDERS_PATH.
    #[arg(long, env = "CUBICLER_PROVIDERS_PATH")]
    providers: Option<String>,

    /// HMAC secret used to verify agent-facing JWTs. No value disables auth entirely.
    #[arg(long, env = "CUBICLER_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Expected `iss` claim, checked only when `jwt_secret` is set.
    #[arg(long, env = "CUBICLER_JWT_ISSUER")]
    jwt_issuer: Option<String>,

    /// Expected `aud` claim, checked only when `jwt_secret` is set.
    #[arg(long, env = "CUBICLER_JWT_AUDIENCE")]
    jwt_audience: Option<String>,

    /// Interval between provider-repository metadata refreshes.
    #[arg(long, env = "CUBICLER_PROVIDER_REFRESH_SECS", default_value_t = 30)]
    provider_refresh_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let timeouts = Timeouts::from_env();
    if strict_params_enabled() {
        info!("STRICT_PARAMS enabled: tool calls with mismatched argument schemas will be rejected upstream");
    }

    let agents_path = args.agents.expect("--agents or CUBICLER_AGENTS_PATH must be set");
    let providers_path = args.providers.expect("--providers or CUBICLER_PROVIDERS_PATH must be set");

    let agents_cache = CachedConfig::new(source_from_env_value(&agents_path), DEFAULT_CONFIG_TTL);

    // The repository and the provider services each hold their own cache
    // over the same source: they read independently on their own TTLs and
    // neither needs to share state with the other.
    let repo = Arc::new(ProviderRepository::new(CachedConfig::new(
        source_from_env_value(&providers_path),
        DEFAULT_CONFIG_TTL,
    )));
    repo.refresh().await?;

    let providers_cache: CachedConfig<ProvidersConfig> =
        CachedConfig::new(source_from_env_value(&providers_path), DEFAULT_CONFIG_TTL);
    let providers_snapshot = providers_cache.get().await?;

    let mcp_provider = Arc::new(McpProviderService::new(
        providers_snapshot.mcp_servers.clone(),
        repo.clone(),
        timeouts,
    ));
    mcp_provider.initialize_all().await;

    let rest_adapter = Arc::new(RestAdapterService::new(providers_snapshot.rest_servers.clone(), repo.clone()));

    let internal_tools = Arc::new(InternalToolsService::new(
        repo.clone(),
        mcp_provider.clone() as Arc<dyn ToolProvider>,
        rest_adapter.clone() as Arc<dyn ToolProvider>,
    ));

    let mcp = Arc::new(McpDispatcher::new(
        internal_tools as Arc<dyn ToolProvider>,
        mcp_provider as Arc<dyn ToolProvider>,
        rest_adapter as Arc<dyn ToolProvider>,
    ));

    let sse = Arc::new(SseAgentRegistry::new());

    // Direct agent transports require an in-process model provider, which the
    // core deliberately does not ship (spec §4.8.4 Non-goal); the registry
    // starts empty and a deployment embedding one would populate it here.
    let direct_providers = HashMap::new();

    let dispatch = Arc::new(DispatchService::new(
        agents_cache,
        repo.clone(),
        mcp.clone(),
        timeouts,
        sse.clone(),
        direct_providers,
    ));

    spawn_provider_refresh(repo.clone(), Duration::from_secs(args.provider_refresh_secs));

    let auth = args.jwt_secret.as_ref().map(|secret| {
        let mut verifier = JwtVerifier::new(secret.as_bytes(), Algorithm::HS256);
        if let Some(issuer) = &args.jwt_issuer {
            verifier = verifier.with_issuer(issuer.clone());
        }
        if let Some(audience) = &args.jwt_audience {
            verifier = verifier.with_audience(audience.clone());
        }
        Arc::new(verifier)
    });
    if auth.is_none() {
        warn!("no CUBICLER_JWT_SECRET configured; the broker's HTTP surface is unauthenticated");
    }

    let state = AppState { dispatch, mcp, repo, sse, auth };
    let router = build_router(state);

    info!(addr = %args.bind_addr, "cubicler listening");
    let listener = tokio::net::TcpListener::bind(args.bind_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Re-derives provider metadata on an interval so newly added/removed
/// servers are picked up without a restart (spec §4.4's digest-gated
/// regeneration already makes this cheap when nothing changed).
fn spawn_provider_refresh(repo: Arc<ProviderRepository>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = repo.refresh().await {
                warn!(error = %e, "provider repository refresh failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
