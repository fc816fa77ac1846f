//! # Telex Common Library
//!
//! Shared code for the telex telemetry service and tools:
//! - Telemetry data model (stream kinds, samples, device telemetry)
//! - Capture timestamp normalization
//! - CSV field encoding and table parsing
//! - Configuration loading
//! - Error types

pub mod config;
pub mod csv;
pub mod error;
pub mod telemetry;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use telemetry::{DecodedMetadata, Device, DeviceTelemetry, Sample, StreamKind, TelemetryStream};
