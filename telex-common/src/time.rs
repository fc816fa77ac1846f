//! Timestamp utilities
//!
//! Capture timestamps reported by the normalizer are treated as local
//! wall-clock values. Rendering shifts each one by the host timezone offset in
//! effect at that instant (computed per sample, so daylight-saving changes
//! inside a recording are honoured) and prints it as an ISO-8601 UTC string
//! with millisecond precision.

use chrono::{
    DateTime, Duration, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use serde_json::Value;

/// Marker rendered in place of a timestamp that cannot be parsed
pub const INVALID_DATE: &str = "Invalid Date";

/// Date-time layouts without an offset, interpreted in the host timezone
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a sample's `date` field using the host timezone
pub fn render_capture_date(raw: Option<&Value>) -> String {
    render_capture_date_in(raw, &Local)
}

/// Render a sample's `date` field against an explicit timezone
///
/// Returns [`INVALID_DATE`] when the value is absent or unparseable.
pub fn render_capture_date_in<Tz: TimeZone>(raw: Option<&Value>, tz: &Tz) -> String {
    match raw.and_then(|value| parse_capture_date(value, tz)) {
        Some(instant) => shift_by_local_offset(instant, tz),
        None => INVALID_DATE.to_string(),
    }
}

/// Interpret a JSON `date` value as an instant
///
/// Strings carrying an offset (`Z`, `+06:00`) are absolute; date-only strings
/// are UTC midnight; date-times without an offset are wall-clock time in `tz`.
/// Numbers are milliseconds since the Unix epoch.
pub fn parse_capture_date<Tz: TimeZone>(value: &Value, tz: &Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_capture_str(text.trim(), tz),
        Value::Number(number) => {
            let millis = number.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            DateTime::<Utc>::from_timestamp_millis(millis.trunc() as i64)
        }
        _ => None,
    }
}

fn parse_capture_str<Tz: TimeZone>(text: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, layout) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .and_then(|naive| local_to_utc(&naive, tz))
}

/// Resolve a wall-clock time in `tz`
///
/// Ambiguous times (clocks turned back) take the earlier instant; times in a
/// gap (clocks turned forward) are moved past the gap.
fn local_to_utc<Tz: TimeZone>(naive: &NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Some(dt) = tz.from_local_datetime(naive).earliest() {
        return Some(dt.with_timezone(&Utc));
    }
    let shifted = *naive + Duration::hours(1);
    tz.from_local_datetime(&shifted)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Add the `tz` offset observed at `instant` and print as UTC ISO-8601
///
/// Returns [`INVALID_DATE`] when the shifted instant leaves the representable
/// range.
pub fn shift_by_local_offset<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String {
    let offset_secs = tz
        .offset_from_utc_datetime(&instant.naive_utc())
        .fix()
        .local_minus_utc();
    match instant.checked_add_signed(Duration::seconds(i64::from(offset_secs))) {
        Some(shifted) => shifted.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => INVALID_DATE.to_string(),
    }
}
