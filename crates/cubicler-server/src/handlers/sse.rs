use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use cubicler_agent_transport::SseAgentRegistry;
use futures::Stream;
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Disconnects the agent's registry entry once the stream is dropped,
/// whether it ended normally or the client went away mid-connection.
struct DisconnectOnDrop {
    registry: Arc<SseAgentRegistry>,
    agent_id: String,
}

impl Drop for DisconnectOnDrop {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let agent_id = std::mem::take(&mut self.agent_id);
        tokio::spawn(async move { registry.disconnect(&agent_id).await });
    }
}

#[derive(Debug, Deserialize)]
pub struct SseQuery {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(default)]
    token: Option<String>,
}

/// Spec §6/§4.8.2: `GET /mcp/sse?clientId=…&token=…` — an agent's long-lived
/// connection. Cubicler is the SSE server here; `dispatch` pushes
/// `agent_request` events down this stream and the agent answers over
/// `POST /mcp` with method `agent_response`.
pub async fn sse_handler(
    State(state): State<AppState>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if let Some(verifier) = &state.auth {
        verifier.verify_token(query.token.as_deref().unwrap_or(""))?;
    }

    info!(agent = %query.client_id, "agent sse connection established");
    let mut receiver = state.sse.register_agent_connection(&query.client_id).await;
    let guard = DisconnectOnDrop {
        registry: state.sse.clone(),
        agent_id: query.client_id.clone(),
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = receiver.recv().await {
            yield Ok(Event::default()
                .id(event.id)
                .event(event.event)
                .data(event.data.to_string()));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
