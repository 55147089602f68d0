use std::time::Duration;

use cubicler_config::{McpServerEntry, McpServerTransportConfig};

use crate::error::TransportError;
use crate::http::HttpMcpTransport;
use crate::sse::SseMcpTransport;
use crate::stdio::StdioMcpTransport;
use crate::McpTransport;

/// Build the right [`McpTransport`] for a configured provider entry.
pub fn create(
    entry: &McpServerEntry,
    call_timeout: Duration,
    stop_grace: Duration,
) -> Result<Box<dyn McpTransport>, TransportError> {
    match &entry.transport {
        McpServerTransportConfig::Http { url, headers, auth } => {
            let bearer = auth.as_ref().map(|a| a.token.as_str());
            let transport =
                HttpMcpTransport::new(&entry.identifier, url, headers.as_ref(), bearer, call_timeout)?;
            Ok(Box::new(transport))
        }
        McpServerTransportConfig::Sse { url, headers, auth } => {
            let bearer = auth.as_ref().map(|a| a.token.as_str());
            let transport =
                SseMcpTransport::new(&entry.identifier, url, headers.as_ref(), bearer, call_timeout)?;
            Ok(Box::new(transport))
        }
        McpServerTransportConfig::Stdio {
            command,
            args,
            cwd,
            env,
        } => {
            let args = args.clone().unwrap_or_default();
            let transport = StdioMcpTransport::spawn(
                &entry.identifier,
                command,
                &args,
                cwd.as_deref(),
                env.as_ref(),
                call_timeout,
                stop_grace,
            )?;
            Ok(Box::new(transport))
        }
    }
}
