use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend_client::BackendError;
use crate::drafts::DraftError;
use crate::tailoring::workflow::{EditError, Gate};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// A workflow transition was refused. Not a failure of the session.
    #[error("{0}")]
    Gate(#[from] Gate),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Draft store error: {0}")]
    Draft(#[from] DraftError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EditError> for AppError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::Gate(gate) => AppError::Gate(gate),
            EditError::Parse(msg) => AppError::UnprocessableEntity(format!("Invalid JSON: {msg}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Gate(gate @ Gate::InFlight(_)) => {
                (StatusCode::CONFLICT, "IN_FLIGHT", gate.to_string())
            }
            AppError::Gate(gate) => (StatusCode::BAD_REQUEST, "GATE_CLOSED", gate.to_string()),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {e}");
                // The backend's body is the only useful explanation the user gets.
                (StatusCode::BAD_GATEWAY, "BACKEND_ERROR", e.to_string())
            }
            AppError::Draft(e) => {
                tracing::error!("Draft store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DRAFT_STORE_ERROR",
                    e.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
