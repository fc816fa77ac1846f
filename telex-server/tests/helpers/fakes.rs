//! In-process stand-ins for the external decoder and normalizer

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use telex_common::{DecodedMetadata, DeviceTelemetry, StreamKind};
use telex_server::services::{
    DecodeError, MetadataDecoder, NormalizeError, NormalizeOptions, TelemetryNormalizer,
};

/// Decoder that accepts any buffer, or rejects every one
pub struct FakeDecoder {
    reject: bool,
    pub calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn accepting() -> Self {
        Self {
            reject: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataDecoder for FakeDecoder {
    async fn decode(&self, buffer: Vec<u8>) -> Result<DecodedMetadata, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(DecodeError::Rejected("no metadata track".to_string()));
        }
        // The upload's bytes travel on as a marker so outputs differ per upload
        Ok(DecodedMetadata::new(json!({
            "rawData": {"type": "Buffer", "data": [1, 2, 3]},
            "timing": {"frameDuration": 0.04, "samples": []},
            "marker": String::from_utf8_lossy(&buffer),
        })))
    }
}

/// Normalizer producing fixed samples for every stream it has not been told to omit
pub struct FakeNormalizer {
    omit: HashSet<StreamKind>,
    pub calls: AtomicUsize,
}

impl FakeNormalizer {
    pub fn complete() -> Self {
        Self {
            omit: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn without(kind: StreamKind) -> Self {
        Self {
            omit: HashSet::from([kind]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryNormalizer for FakeNormalizer {
    async fn normalize(
        &self,
        metadata: &DecodedMetadata,
        options: &NormalizeOptions,
    ) -> Result<DeviceTelemetry, NormalizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let kind = StreamKind::from_tag(&options.stream)
            .ok_or_else(|| NormalizeError::InvalidOutput(format!("unknown stream {}", options.stream)))?;
        if self.omit.contains(&kind) {
            return Ok(DeviceTelemetry::default());
        }

        let marker = metadata.as_json().get("marker").cloned().unwrap_or(Value::Null);
        let samples = samples_for(kind, marker);
        DeviceTelemetry::try_from(json!({
            "1": {
                "device name": "Test Camera",
                "streams": {kind.tag(): {"name": kind.tag(), "samples": samples}}
            }
        }))
        .map_err(|e| NormalizeError::InvalidOutput(e.to_string()))
    }
}

/// Two samples per stream; the second carries an unparseable date
pub fn samples_for(kind: StreamKind, marker: Value) -> Value {
    match kind {
        StreamKind::Position => json!([
            position_sample(0, "2023-01-01T00:00:00"),
            position_sample(1000, "not-a-date"),
        ]),
        StreamKind::Acceleration => json!([
            {"cts": 0, "date": "2023-01-01T00:00:00Z", "Accelerometer (z) [m/s²]": 9.81,
             "Accelerometer (x) [m/s²]": 0.1, "Accelerometer (y) [m/s²]": -0.2, "temperature [°C]": marker},
            {"cts": 5, "date": "not-a-date", "Accelerometer (z) [m/s²]": 9.8,
             "Accelerometer (x) [m/s²]": 0.0, "Accelerometer (y) [m/s²]": 0.3, "temperature [°C]": marker},
        ]),
        StreamKind::AngularRate => json!([
            {"cts": 0, "date": "2023-01-01T00:00:00Z", "Gyroscope (z) [rad/s]": 0.01,
             "Gyroscope (x) [rad/s]": 0.02, "Gyroscope (y) [rad/s]": 0.03, "temperature [°C]": marker},
            {"cts": 5, "date": "not-a-date", "Gyroscope (z) [rad/s]": 0.04,
             "Gyroscope (x) [rad/s]": 0.05, "Gyroscope (y) [rad/s]": 0.06, "temperature [°C]": marker},
        ]),
    }
}

pub fn position_sample(cts: u64, date: &str) -> Value {
    json!({
        "cts": cts,
        "date": date,
        "GPS (Lat.) [deg]": 23.8,
        "GPS (Long.) [deg]": 90.4,
        "GPS (Alt.) [m]": 10,
        "GPS (2D speed) [m/s]": 1.2,
        "GPS (3D speed) [m/s]": 1.3,
        "fix": 3,
        "precision": 400
    })
}
