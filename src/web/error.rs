//! Web error types for the OrchestrAI API.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::TraceError;
use crate::data::DatabaseError;
use crate::eval::DispatchError;
use crate::replay::ReplayError;

/// Error type for web API operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request with validation error.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Background service not accepting work.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg.clone())),
            WebError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad Request", Some(msg.clone()))
            }
            WebError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    None,
                )
            }
            WebError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database Error", None)
            }
            WebError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                Some(msg.clone()),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<TraceError> for WebError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::RunNotFound(_) => WebError::NotFound(err.to_string()),
            TraceError::Validation(_) | TraceError::InvalidTransition { .. } => {
                WebError::BadRequest(err.to_string())
            }
            TraceError::Storage(e) => WebError::Database(e),
        }
    }
}

impl From<ReplayError> for WebError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::SourceNotFound(_) => WebError::NotFound(err.to_string()),
            ReplayError::Trace(e) => e.into(),
            ReplayError::Executor { .. } => WebError::Internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for WebError {
    fn from(err: DispatchError) -> Self {
        WebError::Unavailable(err.to_string())
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        WebError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        WebError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RunStatus;

    #[test]
    fn test_trace_errors_map_to_status_codes() {
        let cases = [
            (TraceError::RunNotFound(1), StatusCode::NOT_FOUND),
            (TraceError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                TraceError::InvalidTransition {
                    run_id: 1,
                    from: RunStatus::Success,
                    to: RunStatus::Running,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                TraceError::Storage(DatabaseError::LockPoisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let response = WebError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_missing_replay_source_is_not_found() {
        let response = WebError::from(ReplayError::SourceNotFound(3)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
