//! Artifact retention
//!
//! Artifacts, diagnostic dumps and abandoned staged uploads are deleted once
//! older than the configured maximum age. Request directories are removed when
//! left empty.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use telex_common::config::RetentionConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub errors: usize,
}

fn is_expired(path: &Path, max_age: Duration, now: SystemTime) -> std::io::Result<bool> {
    let modified = std::fs::metadata(path)?.modified()?;
    // Clock skew (mtime in the future) counts as fresh
    Ok(now.duration_since(modified).map(|age| age > max_age).unwrap_or(false))
}

fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    Ok(std::fs::read_dir(path)?.next().is_none())
}

/// Delete everything under `roots` last modified more than `max_age` before `now`
///
/// The roots themselves are never removed. A directory is removed when it is
/// empty and either expired itself or emptied by this sweep.
pub fn sweep_expired(roots: &[PathBuf], max_age: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    for root in roots {
        if !root.exists() {
            continue;
        }
        let mut emptied: HashSet<PathBuf> = HashSet::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Retention walk error");
                    report.errors += 1;
                    continue;
                }
            };
            let path = entry.path();

            let removed = if entry.file_type().is_dir() {
                let candidate = match is_empty_dir(path) {
                    Ok(true) => emptied.contains(path) || is_expired(path, max_age, now).unwrap_or(false),
                    Ok(false) => false,
                    Err(_) => false,
                };
                candidate && remove(path, std::fs::remove_dir(path), &mut report.errors)
            } else {
                match is_expired(path, max_age, now) {
                    Ok(true) => remove(path, std::fs::remove_file(path), &mut report.errors),
                    Ok(false) => false,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                        false
                    }
                }
            };

            if removed {
                if entry.file_type().is_dir() {
                    report.dirs_removed += 1;
                } else {
                    report.files_removed += 1;
                }
                if let Some(parent) = path.parent() {
                    emptied.insert(parent.to_path_buf());
                }
            }
        }
    }

    report
}

fn remove(path: &Path, result: std::io::Result<()>, errors: &mut usize) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired entry");
            *errors += 1;
            false
        }
    }
}

/// Run [`sweep_expired`] every `sweep_interval` until `cancel` fires
pub fn spawn_sweeper(
    roots: Vec<PathBuf>,
    config: RetentionConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let roots = Arc::new(roots);
    let max_age = config.max_age();
    let period = config.sweep_interval().max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Retention sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    let roots = Arc::clone(&roots);
                    let sweep = tokio::task::spawn_blocking(move || {
                        sweep_expired(&roots, max_age, SystemTime::now())
                    });
                    match sweep.await {
                        Ok(report) if report.files_removed + report.dirs_removed > 0 => {
                            tracing::info!(
                                files = report.files_removed,
                                dirs = report.dirs_removed,
                                errors = report.errors,
                                "Expired artifacts removed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Retention sweep panicked"),
                    }
                }
            }
        }
    })
}
