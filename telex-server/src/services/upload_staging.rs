//! Upload staging
//!
//! Streams the uploaded video to the staging directory chunk by chunk,
//! enforcing the configured size bound. The staged file belongs to one request
//! and is deleted when the request finishes, whatever the outcome.

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Base name used when the upload carries no usable file name
pub const DEFAULT_BASE_NAME: &str = "upload";

/// Longest extension kept on a staged file name
const MAX_EXTENSION_LEN: usize = 16;

/// Staging errors
#[derive(Debug, Error)]
pub enum StagingError {
    /// Upload exceeds the configured maximum
    #[error("Upload exceeds the maximum of {limit} bytes")]
    TooLarge { limit: u64 },

    /// Staging file could not be written or read
    #[error("Staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request body could not be read
    #[error("Upload transfer failed: {0}")]
    Transport(String),
}

impl StagingError {
    fn from_multipart(err: MultipartError, limit: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StagingError::TooLarge { limit }
        } else {
            StagingError::Transport(err.body_text())
        }
    }
}

/// A video staged on disk for the duration of one request
#[derive(Debug)]
pub struct StagedUpload {
    pub request_id: Uuid,
    pub path: PathBuf,
    /// File name as sent by the client
    pub original_name: Option<String>,
    /// Sanitised display name used for artifact names
    pub base_name: String,
    pub size_bytes: u64,
    removed: bool,
}

impl StagedUpload {
    /// Delete the staged file; failures are logged, never returned
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(
                request_id = %self.request_id,
                path = %self.path.display(),
                "Staged upload deleted"
            ),
            Err(e) => warn!(
                request_id = %self.request_id,
                path = %self.path.display(),
                error = %e,
                "Failed to delete staged upload"
            ),
        }
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        // Reached only when the request was abandoned before `remove`
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadStager {
    upload_dir: PathBuf,
    max_bytes: u64,
}

impl UploadStager {
    pub fn new(upload_dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Stage a multipart file field
    pub async fn stage_field(
        &self,
        request_id: Uuid,
        field: Field<'_>,
    ) -> Result<StagedUpload, StagingError> {
        let original_name = field.file_name().map(str::to_string);
        let limit = self.max_bytes;
        let chunks = field.map(|chunk| chunk.map_err(|e| StagingError::from_multipart(e, limit)));
        self.stage_stream(request_id, original_name, chunks).await
    }

    /// Stage any stream of body chunks
    pub async fn stage_stream<S>(
        &self,
        request_id: Uuid,
        original_name: Option<String>,
        chunks: S,
    ) -> Result<StagedUpload, StagingError>
    where
        S: Stream<Item = Result<Bytes, StagingError>>,
    {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self
            .upload_dir
            .join(staged_file_name(&request_id, original_name.as_deref()));

        // Guard owns the path from here on: any early return deletes it
        let mut staged = StagedUpload {
            request_id,
            base_name: display_base_name(original_name.as_deref()),
            original_name,
            path,
            size_bytes: 0,
            removed: false,
        };

        let mut file = tokio::fs::File::create(&staged.path).await?;
        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            staged.size_bytes += chunk.len() as u64;
            if staged.size_bytes > self.max_bytes {
                return Err(StagingError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(
            request_id = %staged.request_id,
            path = %staged.path.display(),
            bytes = staged.size_bytes,
            "Upload staged"
        );
        Ok(staged)
    }
}

/// `<unix millis>-<request id><.ext>`
pub fn staged_file_name(request_id: &Uuid, original_name: Option<&str>) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{}-{}{}", millis, request_id, staged_extension(original_name))
}

fn last_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn split_extension(file: &str) -> (&str, Option<&str>) {
    match file.rfind('.') {
        Some(index) if index > 0 => (&file[..index], Some(&file[index + 1..])),
        _ => (file, None),
    }
}

fn staged_extension(original_name: Option<&str>) -> String {
    let ext = original_name
        .map(last_component)
        .and_then(|file| split_extension(file).1)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });
    match ext {
        Some(ext) => format!(".{}", ext),
        None => String::new(),
    }
}

/// Human-readable base name: last path component, extension stripped,
/// characters outside `[A-Za-z0-9._-]` replaced by `_`
pub fn display_base_name(original_name: Option<&str>) -> String {
    let file = original_name.map(last_component).unwrap_or("");
    let stem = split_extension(file).0;
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        DEFAULT_BASE_NAME.to_string()
    } else {
        cleaned
    }
}
