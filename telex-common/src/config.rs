//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. The file is located
//! in priority order:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`TELEX_CONFIG`)
//! 3. Platform config directory (`<config dir>/telex/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! Missing sections and keys fall back to the defaults defined here.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TELEX_CONFIG";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "TELEX_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding uploads, downloads and diagnostics
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// External metadata-track decoder
    #[serde(default = "default_decoder")]
    pub decoder: ExternalToolConfig,

    /// External telemetry normalizer
    #[serde(default = "default_normalizer")]
    pub normalizer: ExternalToolConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            decoder: default_decoder(),
            normalizer: default_normalizer(),
            retention: RetentionConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upload staging and artifact storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Staged uploads (default: `<root>/uploads`)
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Produced CSV artifacts (default: `<root>/downloads`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Largest accepted upload; the whole asset is buffered in memory for decoding
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Place each request's artifacts under `<output_dir>/<request_id>/`
    ///
    /// When false, artifacts share one flat directory and identical base
    /// names overwrite each other (last writer wins).
    #[serde(default = "default_true")]
    pub namespace_by_request: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            output_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            namespace_by_request: true,
        }
    }
}

/// External program invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalToolConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Artifact retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Artifacts older than this are deleted by the sweeper
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RetentionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: default_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Decoded-metadata diagnostic dumps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub dump_decoded_metadata: bool,

    /// Dump directory (default: `<root>/diagnostics`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dump_decoded_metadata: true,
            dir: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> u64 {
    8 * 1024 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    10 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_decoder() -> ExternalToolConfig {
    ExternalToolConfig {
        program: "gpmf-extract".to_string(),
        args: Vec::new(),
    }
}

fn default_normalizer() -> ExternalToolConfig {
    ExternalToolConfig {
        program: "gopro-telemetry".to_string(),
        args: Vec::new(),
    }
}

impl TomlConfig {
    /// Fix the root folder from CLI, `TELEX_ROOT_FOLDER` and TOML, in that order
    pub fn resolve_root(&mut self, cli_arg: Option<&Path>) {
        let resolved = resolve_root_folder(cli_arg, ROOT_FOLDER_ENV_VAR, self.root_folder.as_deref());
        self.root_folder = Some(resolved);
    }

    pub fn root_folder(&self) -> PathBuf {
        self.root_folder.clone().unwrap_or_else(get_default_root_folder)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.storage
            .upload_dir
            .clone()
            .unwrap_or_else(|| self.root_folder().join("uploads"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.storage
            .output_dir
            .clone()
            .unwrap_or_else(|| self.root_folder().join("downloads"))
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.diagnostics
            .dir
            .clone()
            .unwrap_or_else(|| self.root_folder().join("diagnostics"))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_upload_bytes == 0 {
            return Err(Error::Config(
                "storage.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.retention.enabled && self.retention.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "retention.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.decoder.program.trim().is_empty() {
            return Err(Error::Config("decoder.program is empty".to_string()));
        }
        if self.normalizer.program.trim().is_empty() {
            return Err(Error::Config("normalizer.program is empty".to_string()));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))
    }
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config value
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    get_default_root_folder()
}

/// Locate the config file, if any
///
/// An explicit path (CLI or environment) is returned even when it does not
/// exist so that loading reports it; the platform default is only returned
/// when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|path| path.exists())
}

/// Load configuration, falling back to defaults when no file is found
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            tracing::info!(path = %path.display(), "Loaded configuration file");
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Read and parse one TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = config.to_toml_string()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("telex").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/telex (or /var/lib/telex without a home)
        dirs::data_local_dir()
            .map(|d| d.join("telex"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/telex"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("telex"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/telex"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("telex"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\telex"))
    } else {
        PathBuf::from("./telex_data")
    }
}
