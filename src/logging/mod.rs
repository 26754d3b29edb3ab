//! Logging for the scoring service.
//!
//! Every line goes to stdout and to a size-rotated file in the logs
//! directory. Per-target levels come from configuration; the `RUST_LOG`
//! environment variable overrides them.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "info"
//! max_file_size = 5242880
//! max_files = 3
//!
//! [logging.modules]
//! "scorewatch::watcher" = "debug"
//! ```
//!
//! # Environment Variable
//!
//! ```bash
//! RUST_LOG=debug scorewatch watch
//! RUST_LOG=scorewatch::scoring=trace scorewatch score
//! ```

mod rolling;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

pub use rolling::RollingWriter;

/// Errors raised while installing the logging stack.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Owns the file side of the logging stack.
///
/// Create one before the service starts and drop it after shutdown; dropping
/// flushes the rotated file.
pub struct LogHandle {
    writer: RollingWriter,
    log_path: PathBuf,
}

impl LogHandle {
    /// Active log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Flush buffered output to disk.
    pub fn flush(&self) {
        if let Err(e) = self.writer.flush_all() {
            eprintln!("Failed to flush log file {}: {e}", self.log_path.display());
        }
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Install the stdout and rotated-file layers.
///
/// Fails if a global subscriber is already set.
pub fn init_with_config(config: &LoggingConfig, logs_dir: &Path) -> Result<LogHandle, LoggingError> {
    let log_path = logs_dir.join(&config.file_name);
    let writer = RollingWriter::open(&log_path, config.max_file_size, config.max_files).map_err(
        |source| LoggingError::LogFile {
            path: log_path.clone(),
            source,
        },
    )?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_timer(CompactTime)
        .with_level(true)
        .with_filter(build_filter(config));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_target(true)
        .with_timer(CompactTime)
        .with_filter(build_filter(config));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LogHandle { writer, log_path })
}

/// Stdout-only logging for short-lived commands.
///
/// Safe to call when a subscriber already exists; the call is then a no-op.
pub fn init_console(config: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_timer(CompactTime)
        .with_env_filter(build_filter(config))
        .try_init();
}

/// `RUST_LOG` if set, otherwise the configured default plus module overrides.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    EnvFilter::new(filter_directives(config))
}

fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    for (module, level) in &config.modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("service", "staged", "{}", path.display());
/// log_event!("watcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("dispatcher", "suppressed", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_include_module_overrides() {
        let mut config = LoggingConfig::default();
        config.default = "warn".to_string();
        config
            .modules
            .insert("scorewatch::watcher".to_string(), "debug".to_string());
        config
            .modules
            .insert("scorewatch::scoring".to_string(), "trace".to_string());

        assert_eq!(
            filter_directives(&config),
            "warn,scorewatch::scoring=trace,scorewatch::watcher=debug"
        );
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }
}
