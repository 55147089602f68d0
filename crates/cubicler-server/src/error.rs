//! Broker-boundary HTTP failures (spec §7: "Transport-level HTTP failures at
//! the broker boundary return 4xx/5xx with a JSON `{error, code?}` body").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cubicler_auth::AuthError;
use cubicler_dispatch::DispatchError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody { error: error.into(), code: None },
        }
    }

    pub fn with_code(status: StatusCode, error: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            body: ErrorBody { error: error.into(), code: Some(code) },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, err.to_string(), err.code())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let status = match err {
            DispatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DispatchError::UnknownAgent(_) | DispatchError::NoAgents => StatusCode::NOT_FOUND,
        };
        Self::new(status, err.to_string())
    }
}
