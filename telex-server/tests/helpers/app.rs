//! Application wiring over a temporary root folder

use axum::body::Body;
use axum::http::Request;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use telex_server::services::{
    ArtifactStore, DiagnosticsDump, ExtractionOrchestrator, StreamSelector, UploadStager,
};
use telex_server::AppState;

use super::fakes::{FakeDecoder, FakeNormalizer};

pub const BOUNDARY: &str = "telex-test-boundary";

/// A wired application plus handles on its fakes and folders
pub struct TestEnv {
    pub temp: TempDir,
    pub decoder: Arc<FakeDecoder>,
    pub normalizer: Arc<FakeNormalizer>,
    pub state: AppState,
}

impl TestEnv {
    pub fn upload_dir(&self) -> PathBuf {
        self.temp.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.temp.path().join("downloads")
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.temp.path().join("diagnostics")
    }

    pub fn orchestrator(&self) -> &ExtractionOrchestrator {
        &self.state.orchestrator
    }
}

pub struct TestEnvBuilder {
    decoder: FakeDecoder,
    normalizer: FakeNormalizer,
    namespace_by_request: bool,
    max_upload_bytes: u64,
}

impl TestEnvBuilder {
    pub fn new() -> Self {
        Self {
            decoder: FakeDecoder::accepting(),
            normalizer: FakeNormalizer::complete(),
            namespace_by_request: true,
            max_upload_bytes: 1024 * 1024,
        }
    }

    pub fn decoder(mut self, decoder: FakeDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn normalizer(mut self, normalizer: FakeNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn flat(mut self) -> Self {
        self.namespace_by_request = false;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn build(self) -> TestEnv {
        let temp = TempDir::new().unwrap();
        let decoder = Arc::new(self.decoder);
        let normalizer = Arc::new(self.normalizer);

        let store = ArtifactStore::new(temp.path().join("downloads"), self.namespace_by_request);
        std::fs::create_dir_all(store.output_dir()).unwrap();
        let orchestrator = ExtractionOrchestrator::new(
            decoder.clone(),
            StreamSelector::new(normalizer.clone()),
            store,
        )
        .with_diagnostics(DiagnosticsDump::new(temp.path().join("diagnostics")));
        let stager = UploadStager::new(temp.path().join("uploads"), self.max_upload_bytes);

        TestEnv {
            state: AppState::new(orchestrator, stager),
            temp,
            decoder,
            normalizer,
        }
    }
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One multipart part: field name, optional file name, contents
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn video_part<'a>(file_name: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name: "video",
        file_name: Some(file_name),
        data,
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: video/mp4\r\n\r\n",
                    part.name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Every regular file below `dir`, relative paths sorted
pub fn files_under(dir: &std::path::Path) -> Vec<String> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let prefix = entry.file_name().to_string_lossy().into_owned();
                files.extend(files_under(&path).into_iter().map(|f| format!("{}/{}", prefix, f)));
            } else {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    files.sort();
    files
}
