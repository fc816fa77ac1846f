//! Error types for telex-server
//!
//! Pipeline failures collapse to one generic message at the HTTP boundary;
//! the cause is logged and kept for `/health`, never returned to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{ExtractionError, StagingError};

/// Message returned for every pipeline failure
pub const EXTRACTION_FAILED: &str = "Failed to extract telemetry data";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload over the configured maximum (413)
    #[error("Upload exceeds the maximum of {0} bytes")]
    PayloadTooLarge(u64),

    /// Upload could not be staged
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Extraction pipeline failed (500)
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(limit) | ApiError::Staging(StagingError::TooLarge { limit }) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds the maximum of {} bytes", limit),
            ),
            ApiError::Staging(StagingError::Transport(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Staging(StagingError::Io(_))
            | ApiError::Extraction(_)
            | ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, EXTRACTION_FAILED.to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
