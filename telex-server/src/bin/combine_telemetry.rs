//! combine-telemetry - merge per-stream telemetry CSVs into one table
//!
//! Reads `<base>_telemetry_data_{GPS5,ACCL,GYRO}.csv` as produced by
//! telex-server and writes a combined table with derived attitude columns.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use telex_common::StreamKind;
use telex_server::services::{artifact_name, combine_files};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "combine-telemetry")]
#[command(about = "Combine GPS, accelerometer and gyroscope CSVs on their timestamps")]
#[command(version)]
struct Args {
    /// Path prefix of the per-stream files, e.g. `downloads/GX019027`
    base: PathBuf,

    /// Output file (default: `<base>_combined.csv`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// GPS CSV overriding the derived path
    #[arg(long)]
    gps: Option<PathBuf>,

    /// Accelerometer CSV overriding the derived path
    #[arg(long)]
    accel: Option<PathBuf>,

    /// Gyroscope CSV overriding the derived path
    #[arg(long)]
    gyro: Option<PathBuf>,
}

fn stream_path(base: &std::path::Path, kind: StreamKind) -> PathBuf {
    let prefix = base
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(artifact_name(&prefix, kind))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let gps = args.gps.clone().unwrap_or_else(|| stream_path(&args.base, StreamKind::Position));
    let accel = args.accel.clone().unwrap_or_else(|| stream_path(&args.base, StreamKind::Acceleration));
    let gyro = args.gyro.clone().unwrap_or_else(|| stream_path(&args.base, StreamKind::AngularRate));
    let output = args.output.clone().unwrap_or_else(|| {
        let mut name = args.base.as_os_str().to_owned();
        name.push("_combined.csv");
        PathBuf::from(name)
    });

    let rows = combine_files(&gps, &accel, &gyro, &output)
        .with_context(|| format!("Failed to combine telemetry for {}", args.base.display()))?;

    info!("Combined telemetry ({} rows) saved to {}", rows, output.display());
    Ok(())
}
