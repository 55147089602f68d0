use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Spec §6: `GET /health` → 200 if healthy, 503 otherwise. There's no
/// persisted state to go unhealthy (spec §6: "Persisted state. None."), so
/// reachability of this handler is itself the health signal.
pub async fn health_handler(State(_state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    (StatusCode::OK, Json(HealthStatus { status: "healthy" }))
}
