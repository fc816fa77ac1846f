//! Extraction Orchestrator
//!
//! Drives one request through the pipeline:
//! read asset → decode once → select + format each stream → commit artifacts.
//!
//! Streams are processed in manifest order (GPS5, ACCL, GYRO). Nothing is
//! written until all three tables are formatted, and the artifact store places
//! them as a unit, so a failed request leaves no artifacts behind.

use std::path::PathBuf;
use std::sync::Arc;
use telex_common::StreamKind;
use thiserror::Error;
use uuid::Uuid;

use crate::services::artifact_store::{
    artifact_name, ArtifactStore, PendingArtifact, ResponseManifest, WriteError,
};
use crate::services::csv_formatter::format_stream;
use crate::services::diagnostics::DiagnosticsDump;
use crate::services::metadata_decoder::{DecodeError, MetadataDecoder};
use crate::services::stream_selector::StreamSelector;
use crate::services::telemetry_normalizer::NormalizeError;
use crate::services::upload_staging::StagingError;

/// Pipeline errors, all fatal to the request
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{stream} normalization failed: {source}")]
    Normalization {
        stream: StreamKind,
        #[source]
        source: NormalizeError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),

    /// Formatting task panicked or was cancelled
    #[error("Formatting task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One staged asset to extract
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub request_id: Uuid,
    pub asset_path: PathBuf,
    /// Display name prefix for artifacts
    pub base_name: String,
}

pub struct ExtractionOrchestrator {
    decoder: Arc<dyn MetadataDecoder>,
    selector: StreamSelector,
    store: ArtifactStore,
    diagnostics: Option<DiagnosticsDump>,
}

impl ExtractionOrchestrator {
    pub fn new(decoder: Arc<dyn MetadataDecoder>, selector: StreamSelector, store: ArtifactStore) -> Self {
        Self {
            decoder,
            selector,
            store,
            diagnostics: None,
        }
    }

    /// Dump decoded metadata for every successful request
    pub fn with_diagnostics(mut self, dump: DiagnosticsDump) -> Self {
        self.diagnostics = Some(dump);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn extract(&self, request: &ExtractionRequest) -> Result<ResponseManifest, ExtractionError> {
        let request_id = request.request_id;

        // The decoder needs the complete buffer
        let buffer = tokio::fs::read(&request.asset_path)
            .await
            .map_err(StagingError::Io)?;
        tracing::debug!(request_id = %request_id, bytes = buffer.len(), "Asset loaded");

        let metadata = self.decoder.decode(buffer).await?;
        tracing::info!(
            request_id = %request_id,
            payload_len = ?metadata.payload_len(),
            frame_rate = ?metadata.frame_rate(),
            timing_samples = ?metadata.timing_sample_count(),
            "Metadata decoded"
        );

        let mut pending = Vec::with_capacity(StreamKind::ALL.len());
        for kind in StreamKind::ALL {
            let telemetry = self
                .selector
                .select(&metadata, kind)
                .await
                .map_err(|source| ExtractionError::Normalization { stream: kind, source })?;

            let contents = tokio::task::spawn_blocking(move || format_stream(kind, &telemetry)).await?;
            pending.push(PendingArtifact {
                kind,
                name: artifact_name(&request.base_name, kind),
                contents,
            });
        }

        let manifest = self.store.commit(&request_id, pending).await?;
        tracing::info!(
            request_id = %request_id,
            base_name = %request.base_name,
            files = manifest.files.len(),
            "CSV files generated"
        );

        if let Some(dump) = &self.diagnostics {
            match dump.write(&request_id, &metadata).await {
                Ok(path) => tracing::debug!(request_id = %request_id, path = %path.display(), "Decoded metadata saved"),
                Err(e) => tracing::warn!(request_id = %request_id, error = %e, "Failed to save decoded metadata"),
            }
        }

        Ok(manifest)
    }
}
