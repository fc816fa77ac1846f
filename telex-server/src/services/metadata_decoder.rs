//! Metadata-track decoder seam
//!
//! Decoding the proprietary telemetry container is delegated to an external
//! tool. The decoder needs the complete file buffer, not a stream.

use async_trait::async_trait;
use telex_common::config::ExternalToolConfig;
use telex_common::DecodedMetadata;
use thiserror::Error;

use crate::services::external_tool::{run_tool, ToolError};

/// Decoder errors
///
/// Corrupt files, missing metadata tracks and unsupported formats all arrive
/// here without further distinction.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Decoder process could not run or rejected the asset
    #[error("Metadata decoder failed: {0}")]
    Tool(#[from] ToolError),

    /// Decoder output was not valid JSON
    #[error("Metadata decoder produced invalid output: {0}")]
    InvalidOutput(String),

    /// Decoder reported the asset unusable
    #[error("Metadata decode rejected: {0}")]
    Rejected(String),
}

/// Converts a complete video buffer into decoded metadata
#[async_trait]
pub trait MetadataDecoder: Send + Sync {
    async fn decode(&self, buffer: Vec<u8>) -> Result<DecodedMetadata, DecodeError>;
}

/// Decoder backed by an external program
///
/// Protocol: the whole video on stdin, decoded metadata as JSON on stdout.
pub struct CommandDecoder {
    tool: ExternalToolConfig,
}

impl CommandDecoder {
    pub fn new(tool: ExternalToolConfig) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl MetadataDecoder for CommandDecoder {
    async fn decode(&self, buffer: Vec<u8>) -> Result<DecodedMetadata, DecodeError> {
        let stdout = run_tool(&self.tool, buffer).await?;
        let value: serde_json::Value = serde_json::from_slice(&stdout)
            .map_err(|e| DecodeError::InvalidOutput(e.to_string()))?;
        if !value.is_object() {
            return Err(DecodeError::Rejected(
                "decoder output is not a JSON object".to_string(),
            ));
        }
        Ok(DecodedMetadata::new(value))
    }
}
