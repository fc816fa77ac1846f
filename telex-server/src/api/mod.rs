//! HTTP API handlers for telex-server

pub mod downloads;
pub mod health;
pub mod upload;

pub use downloads::download_routes;
pub use health::health_routes;
pub use upload::upload_routes;
