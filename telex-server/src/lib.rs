//! telex-server library interface
//!
//! Exposes the pipeline services and router for the binaries and integration
//! tests.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use telex_common::config::TomlConfig;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{
    ArtifactStore, CommandDecoder, CommandNormalizer, DiagnosticsDump, ExtractionOrchestrator,
    StreamSelector, UploadStager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ExtractionOrchestrator>,
    pub stager: Arc<UploadStager>,
    /// Directory served under `/downloads`
    pub output_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last extraction failure, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(orchestrator: ExtractionOrchestrator, stager: UploadStager) -> Self {
        Self {
            output_dir: orchestrator.store().output_dir().to_path_buf(),
            orchestrator: Arc::new(orchestrator),
            stager: Arc::new(stager),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Wire the production pipeline: external tools, storage, diagnostics
    pub fn from_config(config: &TomlConfig) -> Self {
        let decoder = Arc::new(CommandDecoder::new(config.decoder.clone()));
        let normalizer = Arc::new(CommandNormalizer::new(config.normalizer.clone()));
        let store = ArtifactStore::new(config.output_dir(), config.storage.namespace_by_request);

        let mut orchestrator = ExtractionOrchestrator::new(decoder, StreamSelector::new(normalizer), store);
        if config.diagnostics.dump_decoded_metadata {
            orchestrator = orchestrator.with_diagnostics(DiagnosticsDump::new(config.diagnostics_dir()));
        }

        let stager = UploadStager::new(config.upload_dir(), config.storage.max_upload_bytes);
        Self::new(orchestrator, stager)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let output_dir = state.output_dir.clone();

    Router::new()
        .merge(api::upload_routes(state.stager.max_bytes()))
        .merge(api::health_routes())
        .merge(api::download_routes(&output_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
