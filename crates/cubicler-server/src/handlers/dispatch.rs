use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use cubicler_types::DispatchRequest;

use crate::auth::require_bearer;
use crate::error::ApiError;
use crate::state::AppState;

/// Spec §6: `POST /dispatch` — dispatch to the default (first configured) agent.
pub async fn dispatch_default_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<cubicler_types::DispatchResponse>, ApiError> {
    require_bearer(&state, &headers)?;
    let response = state.dispatch.dispatch(None, request).await?;
    Ok(Json(response))
}

/// Spec §6: `POST /dispatch/:agentId` — dispatch to a specific agent.
pub async fn dispatch_agent_handler(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<cubicler_types::DispatchResponse>, ApiError> {
    require_bearer(&state, &headers)?;
    let response = state.dispatch.dispatch(Some(&agent_id), request).await?;
    Ok(Json(response))
}
