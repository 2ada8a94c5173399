//! Error types for the admin web interface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lead_engine::EngineError;
use thiserror::Error;

/// Errors that can occur in the admin web interface.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Routing operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Database error outside the engine.
    #[error("Database error: {0}")]
    Database(#[from] database::DatabaseError),

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),
}

impl AdminError {
    fn status(&self) -> StatusCode {
        match self {
            AdminError::Engine(err) => match err {
                EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::AgentNotFound(_)
                | EngineError::LeadNotFound(_)
                | EngineError::RuleNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::CapacityExceeded { .. }
                | EngineError::InvalidTransition { .. }
                | EngineError::Duplicate(_) => StatusCode::CONFLICT,
                EngineError::Config(_) | EngineError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AdminError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for admin operations.
pub type Result<T> = std::result::Result<T, AdminError>;
