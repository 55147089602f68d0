use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::state::AppState;

/// Validates the `Authorization` header against the configured verifier, if
/// any. A deployment with no verifier configured accepts every request.
pub fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(verifier) = &state.auth else {
        return Ok(());
    };
    let header_value = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    verifier.verify_header(header_value)?;
    Ok(())
}
