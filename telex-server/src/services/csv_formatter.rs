//! Sample Formatter
//!
//! Pure transformation from one stream's device telemetry to its fixed-column
//! CSV table. Rows follow the normalizer's device, stream and sample order.
//!
//! Values render the way a JavaScript template literal would print them, so
//! tables stay comparable with those produced by earlier tooling: a missing
//! field is `undefined`, integral numbers have no fraction, arrays are joined
//! with commas.

use chrono::{Local, TimeZone};
use serde_json::Value;
use telex_common::csv::push_record;
use telex_common::time::{render_capture_date_in, INVALID_DATE};
use telex_common::{DeviceTelemetry, Sample, StreamKind};
use tracing::debug;

/// Rendered in place of a field the sample does not carry
pub const UNDEFINED: &str = "undefined";

/// Format one stream using the host timezone for capture timestamps
pub fn format_stream(kind: StreamKind, telemetry: &DeviceTelemetry) -> String {
    format_stream_in(kind, telemetry, &Local)
}

/// Format one stream against an explicit timezone
pub fn format_stream_in<Tz: TimeZone>(kind: StreamKind, telemetry: &DeviceTelemetry, tz: &Tz) -> String {
    let mut out = String::new();
    push_record(&mut out, kind.columns());

    for stream in telemetry.streams_tagged(kind.tag()) {
        for sample in &stream.samples {
            push_record(&mut out, render_row(kind, sample, tz));
        }
    }
    out
}

fn render_row<Tz: TimeZone>(kind: StreamKind, sample: &Sample, tz: &Tz) -> Vec<String> {
    let mut row = Vec::with_capacity(kind.columns().len());
    row.push(render_value(sample.cts()));

    let date = render_capture_date_in(sample.date(), tz);
    if date == INVALID_DATE {
        debug!(stream = %kind, date = %render_value(sample.date()), "Invalid capture date");
    }
    row.push(date);

    row.extend(kind.value_fields().iter().map(|field| render_value(sample.get(field))));
    row
}

/// Render a JSON value as a JavaScript template literal would
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None => UNDEFINED.to_string(),
        Some(value) => render_json(value),
    }
}

fn render_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => match (number.as_i64(), number.as_u64()) {
            (Some(int), _) => int.to_string(),
            (None, Some(uint)) => uint.to_string(),
            _ => number.as_f64().map(format_js_number).unwrap_or_else(|| number.to_string()),
        },
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                // Array.prototype.join prints null entries as empty
                Value::Null => String::new(),
                other => render_json(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Shortest round-trip decimal, switching to exponent form where JavaScript does
pub fn format_js_number(number: f64) -> String {
    if number == 0.0 {
        return "0".to_string();
    }
    let magnitude = number.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return number.to_string();
    }

    let formatted = format!("{:e}", number);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}
