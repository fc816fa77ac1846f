//! Upload endpoint
//!
//! `POST /upload` with one multipart file field `video`. The upload is staged,
//! extracted and deleted again; the response lists the three CSV artifacts.
//! Text fields are ignored; any other file field is rejected.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use telex_common::uuid_utils::new_request_id;
use tracing::{debug, error, info};

use crate::error::{ApiError, ApiResult};
use crate::services::{ArtifactDescriptor, ExtractionRequest, StagedUpload};
use crate::AppState;

/// Multipart field carrying the video
pub const UPLOAD_FIELD: &str = "video";

/// Allowance for multipart boundaries and part headers on top of the file
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Success response body
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    /// Position, Acceleration, AngularRate
    pub files: Vec<ArtifactDescriptor>,
}

fn multipart_error(err: MultipartError, limit: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(limit)
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// POST /upload
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    let request_id = new_request_id();
    let limit = state.stager.max_bytes();
    let mut staged: Option<StagedUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        // Plain form fields ride along with the file and are ignored
        if field.file_name().is_none() {
            debug!(request_id = %request_id, field = ?field.name(), "Skipping non-file field");
            continue;
        }
        if field.name() != Some(UPLOAD_FIELD) {
            return Err(ApiError::BadRequest(format!(
                "Unexpected file field: {}",
                field.name().unwrap_or("<unnamed>")
            )));
        }
        if staged.is_some() {
            return Err(ApiError::BadRequest(format!(
                "Only one '{}' field is accepted",
                UPLOAD_FIELD
            )));
        }
        staged = Some(state.stager.stage_field(request_id, field).await?);
    }

    let staged = staged.ok_or_else(|| ApiError::BadRequest(format!("Missing '{}' file field", UPLOAD_FIELD)))?;
    info!(
        request_id = %request_id,
        original_name = ?staged.original_name,
        bytes = staged.size_bytes,
        "Upload received"
    );

    let request = ExtractionRequest {
        request_id,
        asset_path: staged.path.clone(),
        base_name: staged.base_name.clone(),
    };

    // Runs to completion even if the client disconnects, so the staged file
    // is always removed after extraction
    let orchestrator = Arc::clone(&state.orchestrator);
    let outcome = tokio::spawn(async move {
        let result = orchestrator.extract(&request).await;
        staged.remove().await;
        result
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    match outcome {
        Ok(manifest) => Ok(Json(UploadResponse {
            message: "CSV files generated successfully".to_string(),
            files: manifest.files,
        })),
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Telemetry extraction failed");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Build upload routes; the body limit covers the file plus multipart framing
pub fn upload_routes(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(body_limit))
}
