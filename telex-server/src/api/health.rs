//! Health check endpoint
//!
//! Reports uptime, whether the downloads directory can be served, and the
//! most recent extraction failure.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when artifacts cannot be served
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub downloads_available: bool,
    /// Most recent extraction failure; one bad upload does not degrade status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let downloads_available = tokio::fs::metadata(&state.output_dir)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !downloads_available {
        tracing::warn!(dir = %state.output_dir.display(), "Downloads directory unavailable");
    }

    Json(HealthResponse {
        status: if downloads_available { "ok" } else { "degraded" },
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        downloads_available,
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
