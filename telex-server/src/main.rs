//! telex-server - Action-camera telemetry extraction service
//!
//! Accepts a video upload, extracts its embedded GPS, accelerometer and
//! gyroscope telemetry, and serves one CSV file per stream for download.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telex_common::config::{self, TomlConfig};
use telex_server::services::spawn_sweeper;
use telex_server::{build_router, AppState};

/// Command-line arguments for telex-server
#[derive(Parser, Debug)]
#[command(name = "telex-server")]
#[command(about = "Telemetry extraction service for action-camera videos")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TELEX_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "TELEX_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TELEX_PORT")]
    port: Option<u16>,

    /// Root folder for uploads, downloads and diagnostics
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Save the effective configuration to this TOML file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

fn effective_config(args: &Args) -> Result<TomlConfig> {
    let mut config = config::load_config(args.config.as_deref())?;
    config.resolve_root(args.root_folder.as_deref());
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = effective_config(&args).context("Failed to load configuration")?;

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if let Some(path) = &args.write_config {
        config::write_toml_config(&config, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting telex-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder().display());

    let upload_dir = config.upload_dir();
    let output_dir = config.output_dir();
    let diagnostics_dir = config.diagnostics_dir();
    for dir in [&upload_dir, &output_dir, &diagnostics_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    info!("Uploads: {}", upload_dir.display());
    info!("Downloads: {}", output_dir.display());
    info!(
        "Decoder: {}, normalizer: {}",
        config.decoder.program, config.normalizer.program
    );

    let shutdown = CancellationToken::new();
    let sweeper = if config.retention.enabled {
        info!(
            "Retention: artifacts older than {}s removed every {}s",
            config.retention.max_age_secs, config.retention.sweep_interval_secs
        );
        Some(spawn_sweeper(
            vec![output_dir.clone(), diagnostics_dir.clone(), upload_dir.clone()],
            config.retention.clone(),
            shutdown.clone(),
        ))
    } else {
        None
    };

    let app = build_router(AppState::from_config(&config));

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", config.server.host, config.server.port))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    tokio::spawn(cancel_on_signal(shutdown.clone()));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    // Stop the sweeper even when the server failed
    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }
    served.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still stops the server.
async fn cancel_on_signal(token: CancellationToken) {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = interrupt => "interrupt",
        _ = terminate => "terminate",
        _ = token.cancelled() => return,
    };
    info!(signal = received, "Shutdown requested; finishing in-flight requests");
    token.cancel();
}
