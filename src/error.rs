use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error taxonomy for the whole service. Handlers return these and the
/// `IntoResponse` impl turns each into a status code plus `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Blob write failed during upload; no record was created
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// Record insert failed after a successful blob write; the blob is
    /// orphaned
    #[error("Record insert failed: {0}")]
    RecordInsert(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error body on the wire: `{"error": "..."}`
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(e) => {
                tracing::error!(error = ?e, "Record store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::StorageWrite(msg) => {
                tracing::error!(%msg, "Blob write failed, upload aborted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upload failed".to_string(),
                )
            }
            AppError::RecordInsert(msg) => {
                tracing::error!(%msg, "Record insert failed after blob write");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upload failed".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!(%msg, "Blob store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!(%msg, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Jwt(e) => {
                tracing::warn!(error = ?e, "Token rejected");
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::Io(e) => {
                tracing::error!(error = ?e, "Filesystem failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
