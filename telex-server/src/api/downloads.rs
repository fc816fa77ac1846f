//! Artifact downloads
//!
//! Static serving of the output directory. Namespaced artifacts resolve as
//! `/downloads/<request_id>/<name>`, flat ones as `/downloads/<name>`.

use axum::Router;
use std::path::Path;
use tower_http::services::ServeDir;

use crate::services::artifact_store::DOWNLOADS_ROUTE;
use crate::AppState;

/// Build download routes serving `output_dir`
pub fn download_routes(output_dir: &Path) -> Router<AppState> {
    Router::new().nest_service(DOWNLOADS_ROUTE, ServeDir::new(output_dir))
}
