//! Artifact store
//!
//! Persists the three per-stream tables of one request as a unit. Every table
//! is written to a request-unique `.partial` file and renamed into place, so a
//! reader never observes a half-written artifact. When any write fails, the
//! artifacts already placed for the request are removed again.

use serde::Serialize;
use std::path::{Path, PathBuf};
use telex_common::StreamKind;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix under which the output directory is served
pub const DOWNLOADS_ROUTE: &str = "/downloads";

/// Artifact write errors
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to prepare artifact directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact {name}: {source}")]
    Artifact {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    /// Human-readable file name
    pub name: String,
    /// Download URL relative to the server root
    pub url: String,
}

/// Artifacts delivered for one request, in stream order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseManifest {
    pub files: Vec<ArtifactDescriptor>,
}

/// Formatted table awaiting persistence
#[derive(Debug, Clone)]
pub struct PendingArtifact {
    pub kind: StreamKind,
    pub name: String,
    pub contents: String,
}

/// `<base>_telemetry_data_<TAG>.csv`
pub fn artifact_name(base_name: &str, kind: StreamKind) -> String {
    format!("{}_telemetry_data_{}.csv", base_name, kind.tag())
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    namespace_by_request: bool,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, namespace_by_request: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            namespace_by_request,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding the request's artifacts
    pub fn request_dir(&self, request_id: &Uuid) -> PathBuf {
        if self.namespace_by_request {
            self.output_dir.join(request_id.to_string())
        } else {
            self.output_dir.clone()
        }
    }

    /// Filesystem path and download URL of an artifact
    pub fn locate(&self, request_id: &Uuid, name: &str) -> (PathBuf, String) {
        let path = self.request_dir(request_id).join(name);
        let url = if self.namespace_by_request {
            format!("{}/{}/{}", DOWNLOADS_ROUTE, request_id, name)
        } else {
            format!("{}/{}", DOWNLOADS_ROUTE, name)
        };
        (path, url)
    }

    /// Place all artifacts of a request, or none of them
    pub async fn commit(
        &self,
        request_id: &Uuid,
        artifacts: Vec<PendingArtifact>,
    ) -> Result<ResponseManifest, WriteError> {
        let dir = self.request_dir(request_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| WriteError::Directory {
                path: dir.clone(),
                source,
            })?;

        let mut placed = Vec::with_capacity(artifacts.len());
        let mut files = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let (path, url) = self.locate(request_id, &artifact.name);
            let partial = dir.join(format!(".{}.{}.partial", artifact.name, request_id));

            if let Err(source) = place(&partial, &path, artifact.contents.as_bytes()).await {
                self.rollback(request_id, &placed).await;
                return Err(WriteError::Artifact {
                    name: artifact.name,
                    source,
                });
            }

            debug!(
                request_id = %request_id,
                stream = %artifact.kind,
                path = %path.display(),
                bytes = artifact.contents.len(),
                "Artifact written"
            );
            placed.push(path);
            files.push(ArtifactDescriptor {
                name: artifact.name,
                url,
            });
        }

        Ok(ResponseManifest { files })
    }

    async fn rollback(&self, request_id: &Uuid, placed: &[PathBuf]) {
        for path in placed {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(request_id = %request_id, path = %path.display(), error = %e, "Failed to roll back artifact");
            }
        }
        if self.namespace_by_request {
            // Only succeeds when nothing else is left in the directory
            let _ = tokio::fs::remove_dir(self.request_dir(request_id)).await;
        }
    }
}

async fn place(partial: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Err(e) = tokio::fs::write(partial, contents).await {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(partial, path).await {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(e);
    }
    Ok(())
}
