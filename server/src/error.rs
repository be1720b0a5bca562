//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use custody_engine::Error as EngineError;
use serde::Serialize;

use crate::sheets::SheetError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sync already in progress")]
    Busy,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(EngineError::RecordNotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Engine(e) if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Engine(EngineError::Mirror(_)) | AppError::Sheet(_) => StatusCode::BAD_GATEWAY,
            AppError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Busy => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_message, details) = match &self {
            AppError::Engine(e) if status.is_client_error() => {
                tracing::debug!("Rejected mutation: {}", e);
                (e.to_string(), None)
            }
            AppError::Engine(e) => {
                tracing::error!("Engine error: {:?}", e);
                ("Storage error".to_string(), Some(e.to_string()))
            }
            AppError::Sheet(e) => {
                tracing::warn!("Sheet error: {}", e);
                ("Spreadsheet unavailable".to_string(), Some(e.to_string()))
            }
            AppError::BadRequest(msg) | AppError::NotFound(msg) => (msg.clone(), None),
            AppError::Busy => (self.to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
