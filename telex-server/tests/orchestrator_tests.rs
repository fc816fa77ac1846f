//! Extraction Orchestrator Integration Tests

mod helpers;

use helpers::{files_under, FakeDecoder, FakeNormalizer, TestEnv, TestEnvBuilder};
use serde_json::json;
use telex_common::time::render_capture_date;
use telex_common::StreamKind;
use telex_server::services::{artifact_name, ExtractionError, ExtractionRequest, NormalizeError};
use uuid::Uuid;

fn stage(env: &TestEnv, contents: &[u8]) -> std::path::PathBuf {
    std::fs::create_dir_all(env.upload_dir()).unwrap();
    let path = env.upload_dir().join(format!("{}.mp4", Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

fn request(env: &TestEnv, base_name: &str) -> ExtractionRequest {
    ExtractionRequest {
        request_id: Uuid::new_v4(),
        asset_path: stage(env, b"video"),
        base_name: base_name.to_string(),
    }
}

fn read_artifact(env: &TestEnv, request: &ExtractionRequest, kind: StreamKind) -> String {
    let (path, _) = env
        .orchestrator()
        .store()
        .locate(&request.request_id, &artifact_name(&request.base_name, kind));
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn position_table_keeps_invalid_date_row() {
    let env = TestEnvBuilder::new().build();
    let request = request(&env, "GX019027");

    env.orchestrator().extract(&request).await.unwrap();

    let csv = read_artifact(&env, &request, StreamKind::Position);
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "cts,date,GPS (Lat.) [deg],GPS (Long.) [deg],GPS (Alt.) [m],GPS (2D speed) [m/s],GPS (3D speed) [m/s],fix,precision"
    );

    let expected_date = render_capture_date(Some(&json!("2023-01-01T00:00:00")));
    assert_eq!(lines[1], format!("0,{},23.8,90.4,10,1.2,1.3,3,400", expected_date));
    assert_eq!(lines[2], "1000,Invalid Date,23.8,90.4,10,1.2,1.3,3,400");
}

#[tokio::test]
async fn manifest_lists_streams_in_fixed_order() {
    let env = TestEnvBuilder::new().build();
    let request = request(&env, "clip");

    let manifest = env.orchestrator().extract(&request).await.unwrap();

    let expected: Vec<_> = StreamKind::ALL
        .into_iter()
        .map(|kind| artifact_name("clip", kind))
        .collect();
    let names: Vec<_> = manifest.files.iter().map(|f| f.name.clone()).collect();
    assert_eq!(names, expected);
    for file in &manifest.files {
        assert_eq!(
            file.url,
            format!("/downloads/{}/{}", request.request_id, file.name)
        );
    }
}

#[tokio::test]
async fn repeated_extraction_is_byte_identical() {
    let env = TestEnvBuilder::new().build();
    let first = request(&env, "clip");
    let second = request(&env, "clip");

    env.orchestrator().extract(&first).await.unwrap();
    env.orchestrator().extract(&second).await.unwrap();

    for kind in StreamKind::ALL {
        assert_eq!(
            read_artifact(&env, &first, kind),
            read_artifact(&env, &second, kind),
            "{kind} differs"
        );
    }
}

#[tokio::test]
async fn decoded_metadata_is_dumped_per_request() {
    let env = TestEnvBuilder::new().build();
    let request = request(&env, "clip");

    env.orchestrator().extract(&request).await.unwrap();

    let dump = env.diagnostics_dir().join(format!("{}.json", request.request_id));
    let stored: serde_json::Value = serde_json::from_slice(&std::fs::read(dump).unwrap()).unwrap();
    assert_eq!(stored["marker"], "video");
    assert_eq!(stored["timing"]["frameDuration"], 0.04);
}

#[tokio::test]
async fn missing_asset_is_staging_error() {
    let env = TestEnvBuilder::new().build();
    let request = ExtractionRequest {
        request_id: Uuid::new_v4(),
        asset_path: env.upload_dir().join("gone.mp4"),
        base_name: "gone".to_string(),
    };

    let err = env.orchestrator().extract(&request).await.unwrap_err();
    assert!(matches!(err, ExtractionError::Staging(_)));
    assert_eq!(env.decoder.call_count(), 0);
}

#[tokio::test]
async fn decode_failure_stops_before_normalization() {
    let env = TestEnvBuilder::new().decoder(FakeDecoder::rejecting()).build();
    let request = request(&env, "clip");

    let err = env.orchestrator().extract(&request).await.unwrap_err();
    assert!(matches!(err, ExtractionError::Decode(_)));
    assert_eq!(env.normalizer.call_count(), 0);
}

#[tokio::test]
async fn absent_stream_names_the_stream_and_writes_nothing() {
    let env = TestEnvBuilder::new()
        .normalizer(FakeNormalizer::without(StreamKind::AngularRate))
        .build();
    let request = request(&env, "clip");

    let err = env.orchestrator().extract(&request).await.unwrap_err();
    match err {
        ExtractionError::Normalization { stream, source } => {
            assert_eq!(stream, StreamKind::AngularRate);
            assert!(matches!(source, NormalizeError::StreamAbsent(StreamKind::AngularRate)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(files_under(&env.output_dir()).is_empty());
    assert!(files_under(&env.diagnostics_dir()).is_empty());
}

#[tokio::test]
async fn write_failure_rolls_back_earlier_streams() {
    // Given: flat layout with a directory squatting on the GYRO artifact name
    let env = TestEnvBuilder::new().flat().build();
    std::fs::create_dir_all(env.output_dir().join("clip_telemetry_data_GYRO.csv")).unwrap();
    let request = request(&env, "clip");

    // When: the request runs
    let err = env.orchestrator().extract(&request).await.unwrap_err();

    // Then: write error, and neither GPS5 nor ACCL remains
    assert!(matches!(err, ExtractionError::Write(_)));
    assert!(!env.output_dir().join("clip_telemetry_data_GPS5.csv").exists());
    assert!(!env.output_dir().join("clip_telemetry_data_ACCL.csv").exists());
    assert!(files_under(&env.diagnostics_dir()).is_empty());
}
