//! Decoded-metadata diagnostic dumps
//!
//! One JSON file per successful request, keyed by request id. Dumps are not
//! part of the response and are removed by the retention sweeper.

use std::path::PathBuf;
use telex_common::{DecodedMetadata, Result};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DiagnosticsDump {
    dir: PathBuf,
}

impl DiagnosticsDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, request_id: &Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", request_id))
    }

    /// Write the dump and return its path
    pub async fn write(&self, request_id: &Uuid, metadata: &DecodedMetadata) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(request_id);
        let json = serde_json::to_vec(metadata)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dump_is_keyed_by_request() {
        let temp = TempDir::new().unwrap();
        let dump = DiagnosticsDump::new(temp.path().join("diagnostics"));
        let metadata = DecodedMetadata::new(json!({"rawData": [1], "timing": {"frameDuration": 0.04}}));

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let first_path = dump.write(&first, &metadata).await.unwrap();
        let second_path = dump.write(&second, &metadata).await.unwrap();

        assert_ne!(first_path, second_path);
        let stored: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&first_path).unwrap()).unwrap();
        assert_eq!(&stored, metadata.as_json());
    }
}
