//! Telemetry normalizer seam
//!
//! Turns decoded metadata into typed, unit-labelled samples for one stream at
//! a time. The normalizer is an external tool; only its contract lives here.

use async_trait::async_trait;
use serde::Serialize;
use telex_common::config::ExternalToolConfig;
use telex_common::{DecodedMetadata, DeviceTelemetry, StreamKind};
use thiserror::Error;

use crate::services::external_tool::{run_tool, ToolError};

/// Normalization errors
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Requested stream not present in the decoded metadata
    #[error("Stream {0} not present in video metadata")]
    StreamAbsent(StreamKind),

    /// Normalizer process could not run or rejected the metadata
    #[error("Telemetry normalizer failed: {0}")]
    Tool(#[from] ToolError),

    /// Normalizer output did not match the telemetry shape
    #[error("Telemetry normalizer produced invalid output: {0}")]
    InvalidOutput(String),
}

/// Fixed normalization policy applied to every stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerPolicy {
    /// Repeat sticky values (e.g. temperature) on every sample
    pub repeat_sticky: bool,
    /// Label every sample value with its header name
    pub repeat_headers: bool,
    /// Discard GPS samples with a worse fix than this
    pub min_gps_fix: u8,
    /// Discard GPS samples with a dilution of precision above this
    pub max_gps_precision: u32,
}

impl NormalizerPolicy {
    pub const DEFAULT: NormalizerPolicy = NormalizerPolicy {
        repeat_sticky: true,
        repeat_headers: true,
        min_gps_fix: 2,
        max_gps_precision: 500,
    };
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Options for one normalizer invocation, in the normalizer's own key names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeOptions {
    pub stream: String,
    #[serde(rename = "repeatSticky")]
    pub repeat_sticky: bool,
    #[serde(rename = "repeatHeaders")]
    pub repeat_headers: bool,
    #[serde(rename = "GPSFix")]
    pub gps_fix: u8,
    #[serde(rename = "GPSPrecision")]
    pub gps_precision: u32,
}

impl NormalizeOptions {
    pub fn for_stream(kind: StreamKind, policy: &NormalizerPolicy) -> Self {
        Self {
            stream: kind.tag().to_string(),
            repeat_sticky: policy.repeat_sticky,
            repeat_headers: policy.repeat_headers,
            gps_fix: policy.min_gps_fix,
            gps_precision: policy.max_gps_precision,
        }
    }
}

/// Produces device telemetry for the stream named in `options`
///
/// Implementations must not keep per-call mutable state: the same metadata may
/// be normalized for several streams concurrently.
#[async_trait]
pub trait TelemetryNormalizer: Send + Sync {
    async fn normalize(
        &self,
        metadata: &DecodedMetadata,
        options: &NormalizeOptions,
    ) -> Result<DeviceTelemetry, NormalizeError>;
}

#[derive(Serialize)]
struct NormalizeInput<'a> {
    extracted: &'a DecodedMetadata,
    options: &'a NormalizeOptions,
}

/// Normalizer backed by an external program
///
/// Protocol: `{"extracted": <metadata>, "options": {...}}` on stdin, device
/// telemetry JSON on stdout.
pub struct CommandNormalizer {
    tool: ExternalToolConfig,
}

impl CommandNormalizer {
    pub fn new(tool: ExternalToolConfig) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl TelemetryNormalizer for CommandNormalizer {
    async fn normalize(
        &self,
        metadata: &DecodedMetadata,
        options: &NormalizeOptions,
    ) -> Result<DeviceTelemetry, NormalizeError> {
        let input = serde_json::to_vec(&NormalizeInput {
            extracted: metadata,
            options,
        })
        .map_err(|e| NormalizeError::InvalidOutput(format!("encode request: {}", e)))?;

        let stdout = run_tool(&self.tool, input).await?;
        serde_json::from_slice(&stdout).map_err(|e| NormalizeError::InvalidOutput(e.to_string()))
    }
}
