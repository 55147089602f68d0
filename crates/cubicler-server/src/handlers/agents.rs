use axum::extract::State;
use axum::Json;
use cubicler_types::AgentInfo;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub total: usize,
    pub agents: Vec<AgentInfo>,
}

/// Spec §6: `GET /agents` → `{total, agents:[AgentInfo]}`.
pub async fn agents_handler(State(state): State<AppState>) -> Result<Json<AgentsResponse>, ApiError> {
    let config = state.dispatch.agents_config().await.map_err(|e| {
        ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let agents: Vec<AgentInfo> = config
        .agents
        .iter()
        .map(|a| AgentInfo {
            identifier: a.identifier.clone(),
            name: a.name.clone(),
            description: a.description.clone(),
        })
        .collect();

    Ok(Json(AgentsResponse { total: agents.len(), agents }))
}
