use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use cubicler_protocol::{McpError, McpRequest, McpResponse};
use cubicler_types::AgentResponse;
use serde::Deserialize;
use tracing::warn;

use crate::auth::require_bearer;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AgentResponseParams {
    #[serde(rename = "requestId")]
    request_id: String,
    response: AgentResponse,
}

/// Spec §6: `POST /mcp` — JSON-RPC 2.0 requests from agents, plus the
/// `agent_response` method an SSE-connected agent uses to post back the
/// result of a dispatch it was handed over its `agent_request` event.
pub async fn mcp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<McpRequest>,
) -> Result<Json<McpResponse>, ApiError> {
    require_bearer(&state, &headers)?;

    if request.jsonrpc != "2.0" {
        return Ok(Json(McpResponse::failure(
            request.id,
            McpError::invalid_request("jsonrpc must be \"2.0\""),
        )));
    }

    if request.method == "agent_response" {
        return Ok(Json(handle_agent_response(&state, request).await));
    }

    Ok(Json(state.mcp.handle_request(request).await))
}

async fn handle_agent_response(state: &AppState, request: McpRequest) -> McpResponse {
    let params = request.params.clone().unwrap_or(serde_json::Value::Null);
    match serde_json::from_value::<AgentResponseParams>(params) {
        Ok(parsed) => {
            state.sse.handle_agent_response(&parsed.request_id, parsed.response).await;
            McpResponse::success(request.id, serde_json::json!({"acknowledged": true}))
        }
        Err(e) => {
            warn!(error = %e, "malformed agent_response params");
            McpResponse::failure(request.id, McpError::invalid_request(format!("malformed agent_response: {e}")))
        }
    }
}
