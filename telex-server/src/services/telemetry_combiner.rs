//! Combined telemetry table
//!
//! Joins the three per-stream CSVs of one recording on their `date` column and
//! derives platform and sensor attitude columns for GIS import.
//!
//! Join: full outer join keyed on `date`, keys in ascending order; rows that
//! share a date are cross-joined. Rows whose date does not parse (including
//! `Invalid Date`) are skipped.

use chrono::DateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use telex_common::csv::{parse_table, push_record, CsvTable};
use thiserror::Error;

/// Horizontal field of view of the wide lens (degrees)
pub const HORIZONTAL_FOV_DEG: f64 = 122.0;

/// Vertical field of view of the wide lens (degrees)
pub const VERTICAL_FOV_DEG: f64 = 94.0;

pub const COMBINED_COLUMNS: [&str; 25] = [
    "Precision Timestamp",
    "Sensor Latitude",
    "Sensor Longitude",
    "Sensor Ellipsoid Height",
    "Sensor True Altitude",
    "Frame Center Latitude",
    "Frame Center Longitude",
    "Frame Center Elevation",
    "Platform Pitch Angle",
    "Platform Roll Angle",
    "Sensor Relative Roll Angle",
    "Sensor Relative Elevation Angle",
    "Sensor Relative Azimuth Angle",
    "Sensor Horizontal Field of View",
    "Sensor Vertical Field of View",
    "Platform Heading Angle",
    "Platform Ground Speed",
    "Platform True Airspeed",
    "Platform Vertical Speed",
    "Slant Range",
    "Wind Speed",
    "Wind Direction",
    "Platform Magnetic Heading",
    "Sensor North Velocity",
    "Sensor East Velocity",
];

const DATE: &str = "date";
const LAT: &str = "GPS (Lat.) [deg]";
const LON: &str = "GPS (Long.) [deg]";
const ALT: &str = "GPS (Alt.) [m]";
const SPEED_2D: &str = "GPS (2D speed) [m/s]";
const SPEED_3D: &str = "GPS (3D speed) [m/s]";
const ACCEL_X: &str = "Accelerometer (x) [m/s²]";
const ACCEL_Y: &str = "Accelerometer (y) [m/s²]";
const ACCEL_Z: &str = "Accelerometer (z) [m/s²]";
const GYRO_X: &str = "Gyroscope (x) [rad/s]";
const GYRO_Y: &str = "Gyroscope (y) [rad/s]";
const GYRO_Z: &str = "Gyroscope (z) [rad/s]";

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: telex_common::Error,
    },

    #[error("The {0} data does not contain a 'date' column")]
    MissingDate(String),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The three per-stream tables of one recording
pub struct StreamTables<'a> {
    pub gps: &'a CsvTable,
    pub accel: &'a CsvTable,
    pub gyro: &'a CsvTable,
}

/// One joined row: at most one source row per table
#[derive(Clone, Copy)]
struct JoinedRow<'a> {
    micros: i64,
    gps: Option<&'a [String]>,
    gyro: Option<&'a [String]>,
    accel: Option<&'a [String]>,
}

fn numeric(table: &CsvTable, row: Option<&[String]>, column: &str) -> Option<f64> {
    let cell = table.cell(row?, column)?.trim();
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn date_micros(date: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(date.trim())
        .ok()
        .map(|dt| dt.timestamp_micros())
}

fn require_date(table: &CsvTable, label: &str) -> Result<usize, CombineError> {
    table
        .column_index(DATE)
        .ok_or_else(|| CombineError::MissingDate(label.to_string()))
}

/// Group row indices by parsed date, skipping unparseable dates
fn index_by_date(table: &CsvTable, date_col: usize) -> BTreeMap<String, Vec<usize>> {
    let mut index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (position, row) in table.rows.iter().enumerate() {
        let Some(date) = row.get(date_col) else { continue };
        if date_micros(date).is_some() {
            index.entry(date.clone()).or_default().push(position);
        }
    }
    index
}

fn join<'a>(tables: &StreamTables<'a>) -> Result<Vec<JoinedRow<'a>>, CombineError> {
    let gps_index = index_by_date(tables.gps, require_date(tables.gps, "GPS")?);
    let gyro_index = index_by_date(tables.gyro, require_date(tables.gyro, "Gyroscope")?);
    let accel_index = index_by_date(tables.accel, require_date(tables.accel, "Accelerometer")?);

    let mut dates: Vec<&String> = gps_index
        .keys()
        .chain(gyro_index.keys())
        .chain(accel_index.keys())
        .collect();
    dates.sort();
    dates.dedup();

    let side = |index: &BTreeMap<String, Vec<usize>>, table: &'a CsvTable, date: &str| -> Vec<Option<&'a [String]>> {
        match index.get(date) {
            Some(rows) => rows.iter().map(|&i| Some(table.rows[i].as_slice())).collect(),
            None => vec![None],
        }
    };

    let mut joined = Vec::new();
    for date in dates {
        let Some(micros) = date_micros(date) else { continue };
        for gps in side(&gps_index, tables.gps, date) {
            for gyro in side(&gyro_index, tables.gyro, date) {
                for accel in side(&accel_index, tables.accel, date) {
                    joined.push(JoinedRow { micros, gps, gyro, accel });
                }
            }
        }
    }
    Ok(joined)
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => value.to_string(),
        _ => String::new(),
    }
}

/// Join the stream tables and render the combined CSV
pub fn combine_tables(tables: &StreamTables<'_>) -> Result<String, CombineError> {
    let rows = join(tables)?;
    let mut out = String::new();
    push_record(&mut out, COMBINED_COLUMNS);

    let mut heading = 0.0;
    let mut previous: Option<(i64, Option<f64>)> = None;

    for row in rows {
        let gps = |column| numeric(tables.gps, row.gps, column);
        let gyro = |column| numeric(tables.gyro, row.gyro, column);
        let accel = |column| numeric(tables.accel, row.accel, column);

        let (lat, lon, alt) = (gps(LAT), gps(LON), gps(ALT));
        let (speed_2d, speed_3d) = (gps(SPEED_2D), gps(SPEED_3D));
        let (ax, ay, az) = (accel(ACCEL_X), accel(ACCEL_Y), accel(ACCEL_Z));
        let (gx, gy, gz) = (gyro(GYRO_X), gyro(GYRO_Y), gyro(GYRO_Z));

        let pitch = ax.zip(ay).zip(az).map(|((x, y), z)| x.atan2((y * y + z * z).sqrt()).to_degrees());
        let roll = ax.zip(ay).zip(az).map(|((x, y), z)| y.atan2((x * x + z * z).sqrt()).to_degrees());

        // Running sum skips rows without a gyro reading
        let heading_angle = gz.map(|z| {
            heading += z;
            heading
        });

        let vertical_speed = match (previous, alt) {
            (Some((prev_micros, Some(prev_alt))), Some(alt)) if row.micros != prev_micros => {
                Some((alt - prev_alt) / (row.micros - prev_micros) as f64)
            }
            _ => None,
        };
        previous = Some((row.micros, alt));

        let ground_speed = speed_2d;
        let slant_range = alt.zip(speed_2d).map(|(a, s)| (a * a + s * s).sqrt());
        let wind_speed = ground_speed.zip(speed_2d).map(|(g, s)| (g * g - s * s).sqrt());
        let wind_direction = lat.zip(lon).map(|(la, lo)| la.atan2(lo).to_degrees());
        let magnetic_heading = gy.zip(gx).map(|(y, x)| y.atan2(x).to_degrees());
        let north_velocity = speed_2d.zip(lat).map(|(s, la)| s * la.to_radians().sin());
        let east_velocity = speed_2d.zip(lon).map(|(s, lo)| s * lo.to_radians().cos());

        let record = [
            row.micros.to_string(),
            cell(lat),
            cell(lon),
            cell(alt),
            cell(alt),
            cell(lat),
            cell(lon),
            cell(alt),
            cell(pitch),
            cell(roll),
            cell(gx),
            cell(gy),
            cell(gz),
            cell(Some(HORIZONTAL_FOV_DEG)),
            cell(Some(VERTICAL_FOV_DEG)),
            cell(heading_angle),
            cell(ground_speed),
            cell(speed_3d),
            cell(vertical_speed),
            cell(slant_range),
            cell(wind_speed),
            cell(wind_direction),
            cell(magnetic_heading),
            cell(north_velocity),
            cell(east_velocity),
        ];
        push_record(&mut out, record);
    }

    Ok(out)
}

fn load(path: &Path) -> Result<CsvTable, CombineError> {
    let text = std::fs::read_to_string(path).map_err(|source| CombineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&text).map_err(|source| CombineError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the three stream CSVs, write the combined table, return its data row count
pub fn combine_files(gps: &Path, accel: &Path, gyro: &Path, output: &Path) -> Result<usize, CombineError> {
    let gps_table = load(gps)?;
    let accel_table = load(accel)?;
    let gyro_table = load(gyro)?;

    for (table, path) in [(&gps_table, gps), (&accel_table, accel), (&gyro_table, gyro)] {
        require_date(table, &path.display().to_string())?;
    }

    let combined = combine_tables(&StreamTables {
        gps: &gps_table,
        accel: &accel_table,
        gyro: &gyro_table,
    })?;
    let rows = combined.lines().count().saturating_sub(1);

    std::fs::write(output, combined).map_err(|source| CombineError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(rows)
}
