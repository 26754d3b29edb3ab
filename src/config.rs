//! Configuration module for the scoring service.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SCOREWATCH_` and use double
//! underscores to separate nested levels:
//! - `SCOREWATCH_INFERENCE__THRESHOLD=0.7` sets `inference.threshold`
//! - `SCOREWATCH_PATHS__INPUT_DIR=/data/in` sets `paths.input_dir`
//! - `SCOREWATCH_WATCH__SETTLE_DELAY_MS=500` sets `watch.settle_delay_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Candidate config locations, relative to the working directory.
pub const CONFIG_CANDIDATES: [&str; 2] = ["configs/settings.toml", "config/settings.toml"];

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SCOREWATCH_";

/// Extension every tabular input must carry.
pub const TABULAR_EXTENSION: &str = "csv";

/// Errors that prevent the service from starting.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Invalid file name for {field}: '{value}' ({reason})")]
    InvalidFileName {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Cannot prepare {role} directory {path}: {source}")]
    Directory {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Filesystem layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Dataset column contract and output naming
    #[serde(default)]
    pub data: DataConfig,

    /// Classification settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Watched-file contract and timing
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels and file rotation
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// Directory watched for incoming datasets
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving prediction and diagnostic artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding the persisted model artifact
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Directory for the rotated service log
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DataConfig {
    /// Identifier column; row position is used when the dataset lacks it
    #[serde(default = "default_id_col")]
    pub id_col: String,

    /// Name of the label column in the predictions table
    #[serde(default = "default_target_col")]
    pub target_col: String,

    /// File name of the predictions table inside the output directory
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Inclusive lower bound on probability for a positive label
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Export the top-ranked feature importances
    #[serde(default = "default_true")]
    pub produce_feature_importances: bool,

    /// Export a density plot of predicted scores
    #[serde(default = "default_true")]
    pub produce_density_plot: bool,

    /// Model artifact file name inside the models directory
    #[serde(default = "default_model_file")]
    pub model_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// The only file name that triggers a run
    #[serde(default = "default_watched_file_name")]
    pub file_name: String,

    /// Canonical copy read by the scoring pipeline
    #[serde(default = "default_staged_file_name")]
    pub staged_file_name: String,

    /// Grace period before touching a freshly detected file
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Tick of the idle loop that checks for shutdown
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,

    /// Forget the last dispatched path once its run completes, so the same
    /// path can trigger again
    #[serde(default = "default_false")]
    pub rearm_after_run: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all targets (`RUST_LOG` takes precedence)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Log file name inside the logs directory
    #[serde(default = "default_log_file_name")]
    pub file_name: String,

    /// Size at which the log file is rotated, in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Number of log files kept, counting the active one
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Per-target overrides, e.g. `scorewatch::watcher = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

// Default value functions
fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_id_col() -> String {
    "id".to_string()
}
fn default_target_col() -> String {
    "label".to_string()
}
fn default_output_file_name() -> String {
    "sample_submission.csv".to_string()
}
fn default_threshold() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_model_file() -> String {
    "model.json".to_string()
}
fn default_watched_file_name() -> String {
    "test.csv".to_string()
}
fn default_staged_file_name() -> String {
    "test.staged.csv".to_string()
}
fn default_settle_delay_ms() -> u64 {
    2000
}
fn default_liveness_interval_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file_name() -> String {
    "service.log".to_string()
}
fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}
fn default_max_files() -> usize {
    3
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            models_dir: default_models_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            id_col: default_id_col(),
            target_col: default_target_col(),
            output_file_name: default_output_file_name(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            produce_feature_importances: true,
            produce_density_plot: true,
            model_file: default_model_file(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            file_name: default_watched_file_name(),
            staged_file_name: default_staged_file_name(),
            settle_delay_ms: default_settle_delay_ms(),
            liveness_interval_ms: default_liveness_interval_ms(),
            rearm_after_run: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            file_name: default_log_file_name(),
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            modules: BTreeMap::new(),
        }
    }
}

impl WatchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms.max(1))
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// `explicit` wins over the candidate locations and must exist. With no
    /// explicit path and no candidate file, defaults and environment apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, StartupError> {
        if let Some(path) = explicit.filter(|path| !path.is_file()) {
            return Err(StartupError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let config_path = explicit
            .map(Path::to_path_buf)
            .or_else(Self::find_config_file);

        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        let settings: Settings = figment
            // Double underscore separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| key.as_str().replace("__", ".").into()))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a specific file, ignoring the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    /// First existing candidate config file.
    pub fn find_config_file() -> Option<PathBuf> {
        CONFIG_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    }

    /// Check every option that cannot be expressed by the type alone.
    pub fn validate(&self) -> Result<(), StartupError> {
        let threshold = self.inference.threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(StartupError::InvalidThreshold(threshold));
        }

        check_bare_name("watch.file_name", &self.watch.file_name, true)?;
        check_bare_name("watch.staged_file_name", &self.watch.staged_file_name, true)?;
        check_bare_name("data.output_file_name", &self.data.output_file_name, false)?;
        check_bare_name("inference.model_file", &self.inference.model_file, false)?;
        check_bare_name("logging.file_name", &self.logging.file_name, false)?;

        if self.watch.file_name == self.watch.staged_file_name {
            return Err(StartupError::InvalidFileName {
                field: "watch.staged_file_name",
                value: self.watch.staged_file_name.clone(),
                reason: "must differ from watch.file_name",
            });
        }

        Ok(())
    }

    /// Create all service directories and resolve them to absolute paths.
    pub fn prepare_directories(&mut self) -> Result<(), StartupError> {
        self.paths.input_dir = ensure_dir("input", &self.paths.input_dir)?;
        self.paths.output_dir = ensure_dir("output", &self.paths.output_dir)?;
        self.paths.models_dir = ensure_dir("models", &self.paths.models_dir)?;
        self.paths.logs_dir = ensure_dir("logs", &self.paths.logs_dir)?;
        Ok(())
    }

    /// Path of the canonical watched file.
    pub fn watched_path(&self) -> PathBuf {
        self.paths.input_dir.join(&self.watch.file_name)
    }

    /// Path of the staged copy consumed by the scoring pipeline.
    pub fn staged_path(&self) -> PathBuf {
        self.paths.input_dir.join(&self.watch.staged_file_name)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file at the first candidate location.
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_CANDIDATES[0]);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

fn check_bare_name(
    field: &'static str,
    value: &str,
    require_tabular: bool,
) -> Result<(), StartupError> {
    let invalid = |reason| StartupError::InvalidFileName {
        field,
        value: value.to_string(),
        reason,
    };

    let path = Path::new(value);
    if value.is_empty() || path.file_name().and_then(|n| n.to_str()) != Some(value) {
        return Err(invalid("must be a bare file name"));
    }

    if require_tabular {
        let has_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(TABULAR_EXTENSION));
        if !has_extension {
            return Err(invalid("must have a .csv extension"));
        }
    }

    Ok(())
}

fn ensure_dir(role: &'static str, path: &Path) -> Result<PathBuf, StartupError> {
    let to_error = |source| StartupError::Directory {
        role,
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(path).map_err(to_error)?;
    path.canonicalize().map_err(to_error)
}
