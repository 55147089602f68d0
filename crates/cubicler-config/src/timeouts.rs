use std::env;
use std::time::Duration;

/// All configurable timeouts from spec §5/§6, with their documented defaults.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub agent_call: Duration,
    pub mcp_transport: Duration,
    pub sse_open: Duration,
    pub sse_response: Duration,
    pub stdio_queue_wait: Duration,
    pub agent_stop_grace: Duration,
    pub mcp_stop_grace: Duration,
    pub config_fetch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            agent_call: Duration::from_secs(90),
            mcp_transport: Duration::from_secs(30),
            sse_open: Duration::from_secs(2),
            sse_response: Duration::from_secs(300),
            stdio_queue_wait: Duration::from_secs(30),
            agent_stop_grace: Duration::from_secs(2),
            mcp_stop_grace: Duration::from_secs(5),
            config_fetch: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    /// Apply `CUBICLER_*_TIMEOUT_MS` overrides from the process environment
    /// on top of the defaults.
    pub fn from_env() -> Self {
        let mut timeouts = Self::default();
        if let Some(ms) = env_ms("CUBICLER_AGENT_CALL_TIMEOUT_MS") {
            timeouts.agent_call = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_MCP_TRANSPORT_TIMEOUT_MS") {
            timeouts.mcp_transport = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_SSE_OPEN_TIMEOUT_MS") {
            timeouts.sse_open = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_SSE_RESPONSE_TIMEOUT_MS") {
            timeouts.sse_response = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_STDIO_QUEUE_WAIT_MS") {
            timeouts.stdio_queue_wait = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_AGENT_STOP_GRACE_MS") {
            timeouts.agent_stop_grace = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_MCP_STOP_GRACE_MS") {
            timeouts.mcp_stop_grace = Duration::from_millis(ms);
        }
        if let Some(ms) = env_ms("CUBICLER_CONFIG_FETCH_TIMEOUT_MS") {
            timeouts.config_fetch = Duration::from_millis(ms);
        }
        timeouts
    }
}

fn env_ms(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Whether the broker should reject tool calls whose arguments don't match
/// the declared schema strictly (spec §6: `STRICT_PARAMS`).
pub fn strict_params_enabled() -> bool {
    env::var("STRICT_PARAMS")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
