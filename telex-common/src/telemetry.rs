//! Telemetry data model
//!
//! Shapes exchanged with the external decoder and normalizer. Both tools speak
//! JSON; field order inside a sample is kept exactly as the normalizer emitted
//! it (serde_json `preserve_order`), and devices and streams keep the
//! normalizer's iteration order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The telemetry categories extracted from every upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// GPS fix: position, speed, fix quality, precision
    Position,
    /// Tri-axis accelerometer
    Acceleration,
    /// Tri-axis gyroscope
    AngularRate,
}

const POSITION_COLUMNS: &[&str] = &[
    "cts",
    "date",
    "GPS (Lat.) [deg]",
    "GPS (Long.) [deg]",
    "GPS (Alt.) [m]",
    "GPS (2D speed) [m/s]",
    "GPS (3D speed) [m/s]",
    "fix",
    "precision",
];

const ACCELERATION_COLUMNS: &[&str] = &[
    "cts",
    "date",
    "Accelerometer (z) [m/s²]",
    "Accelerometer (x) [m/s²]",
    "Accelerometer (y) [m/s²]",
    "temperature [°C]",
];

const ANGULAR_RATE_COLUMNS: &[&str] = &[
    "cts",
    "date",
    "Gyroscope (z) [rad/s]",
    "Gyroscope (x) [rad/s]",
    "Gyroscope (y) [rad/s]",
    "temperature [°C]",
];

impl StreamKind {
    /// Processing and manifest order
    pub const ALL: [StreamKind; 3] = [
        StreamKind::Position,
        StreamKind::Acceleration,
        StreamKind::AngularRate,
    ];

    /// Stream tag understood by the normalizer and used in artifact names
    pub fn tag(self) -> &'static str {
        match self {
            StreamKind::Position => "GPS5",
            StreamKind::Acceleration => "ACCL",
            StreamKind::AngularRate => "GYRO",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// CSV columns in output order
    ///
    /// Every column except `cts` and `date` is also the sample field key the
    /// normalizer emits when header repetition is enabled.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            StreamKind::Position => POSITION_COLUMNS,
            StreamKind::Acceleration => ACCELERATION_COLUMNS,
            StreamKind::AngularRate => ANGULAR_RATE_COLUMNS,
        }
    }

    /// Sample keys rendered verbatim after the two time columns
    pub fn value_fields(self) -> &'static [&'static str] {
        &self.columns()[2..]
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One timestamped reading: named fields plus `cts` and `date`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample(Map<String, Value>);

impl Sample {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Capture-time offset relative to the start of the recording (ms)
    pub fn cts(&self) -> Option<&Value> {
        self.0.get("cts")
    }

    /// Absolute capture timestamp as the normalizer reported it
    pub fn date(&self) -> Option<&Value> {
        self.0.get("date")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Sample {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// One named stream within a device
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryStream {
    /// Stream tag (e.g. `GPS5`)
    pub key: String,
    /// Human-readable stream name, when the normalizer supplies one
    pub name: Option<String>,
    pub samples: Vec<Sample>,
}

/// One recording device and its streams
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub name: Option<String>,
    pub streams: Vec<TelemetryStream>,
}

/// Normalizer output: device id -> stream tag -> ordered samples
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct DeviceTelemetry {
    pub devices: Vec<Device>,
}

#[derive(Deserialize)]
struct WireDevice {
    #[serde(rename = "device name", default)]
    name: Option<String>,
    #[serde(default)]
    streams: Map<String, Value>,
}

#[derive(Deserialize)]
struct WireStream {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    samples: Vec<Map<String, Value>>,
}

impl TryFrom<Map<String, Value>> for DeviceTelemetry {
    type Error = Error;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut devices = Vec::with_capacity(map.len());
        for (id, value) in map {
            let wire: WireDevice = serde_json::from_value(value).map_err(|e| {
                Error::InvalidInput(format!("device {}: {}", id, e))
            })?;

            let mut streams = Vec::with_capacity(wire.streams.len());
            for (key, value) in wire.streams {
                let stream: WireStream = serde_json::from_value(value).map_err(|e| {
                    Error::InvalidInput(format!("device {} stream {}: {}", id, key, e))
                })?;
                streams.push(TelemetryStream {
                    key,
                    name: stream.name,
                    samples: stream.samples.into_iter().map(Sample::from).collect(),
                });
            }

            devices.push(Device {
                id,
                name: wire.name,
                streams,
            });
        }
        Ok(Self { devices })
    }
}

impl TryFrom<Value> for DeviceTelemetry {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::try_from(map),
            other => Err(Error::InvalidInput(format!(
                "telemetry must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

impl DeviceTelemetry {
    /// True when at least one device carries the stream tag
    pub fn contains_stream(&self, tag: &str) -> bool {
        self.streams_tagged(tag).next().is_some()
    }

    /// All streams with the tag, device order then stream order
    pub fn streams_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TelemetryStream> + 'a {
        self.devices
            .iter()
            .flat_map(|device| device.streams.iter())
            .filter(move |stream| stream.key == tag)
    }

    /// Drop every stream other than `tag`, then devices left without streams
    pub fn scoped_to(mut self, tag: &str) -> Self {
        for device in &mut self.devices {
            device.streams.retain(|stream| stream.key == tag);
        }
        self.devices.retain(|device| !device.streams.is_empty());
        self
    }

    pub fn sample_count(&self) -> usize {
        self.devices
            .iter()
            .flat_map(|device| device.streams.iter())
            .map(|stream| stream.samples.len())
            .sum()
    }
}

/// Opaque decoder output
///
/// Only the timing fields are inspected (for logging); the full value is
/// handed to the normalizer unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodedMetadata(Value);

impl DecodedMetadata {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Size of the raw telemetry payload, if present
    pub fn payload_len(&self) -> Option<usize> {
        match self.0.get("rawData")? {
            Value::Array(bytes) => Some(bytes.len()),
            Value::String(encoded) => Some(encoded.len()),
            // Node serializes buffers as {"type": "Buffer", "data": [...]}
            Value::Object(buffer) => buffer.get("data").and_then(Value::as_array).map(Vec::len),
            _ => None,
        }
    }

    /// Seconds per video frame
    pub fn frame_duration(&self) -> Option<f64> {
        self.0.get("timing")?.get("frameDuration")?.as_f64()
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_duration()
            .filter(|duration| *duration > 0.0)
            .map(|duration| 1.0 / duration)
    }

    /// Number of telemetry timing samples listed by the decoder
    pub fn timing_sample_count(&self) -> Option<usize> {
        self.0
            .get("timing")?
            .get("samples")?
            .as_array()
            .map(Vec::len)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
