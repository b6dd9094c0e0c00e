//! # Local Logger
//!
//! Installs the process-wide `tracing` subscriber: a human-readable console
//! layer and a non-blocking file layer, filtered by a level string or
//! `RUST_LOG`. Each start writes a fresh `<app>_<timestamp>.log`; older files
//! of the same application are pruned so that only the most recent previous log
//! is kept alongside the new one.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use glob::{glob, Pattern};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
/// # Logger Error
///
/// Failures while preparing the log directory or installing the subscriber.
pub enum LoggerError {
    /// Creating the directory or removing an old file failed.
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    /// The log file pattern could not be built.
    #[error("Invalid log file pattern: {0}")]
    PatternError(#[from] glob::PatternError),

    /// The level string or `RUST_LOG` is not a valid filter.
    #[error("Invalid log filter: {0}")]
    FilterError(String),

    /// A global subscriber is already installed.
    #[error("Failed to install the logger: {0}")]
    InitError(String),
}

/// # Log Settings
///
/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Prefix of the log file names.
    pub app_name: String,
    /// Directory receiving the log files; created when missing.
    pub log_dir: PathBuf,
    /// `trace`, `debug`, `info`, `warn`, `error` or `fatal`.
    pub level: String,
    /// Write the file log as JSON lines instead of text.
    pub json_file: bool,
}

impl LogSettings {
    /// Text logging at `level` into `log_dir`.
    pub fn new(app_name: impl Into<String>, log_dir: impl Into<PathBuf>, level: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            log_dir: log_dir.into(),
            level: level.into(),
            json_file: false,
        }
    }
}

/// Maps the configured level name onto a `tracing` filter directive.
/// Unknown names fall back to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" | "silly" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "fatal" => "error",
        _ => "info",
    }
}

/// File name of a log started at `started`.
pub fn log_file_name(app_name: &str, started: DateTime<Local>) -> String {
    format!("{}_{}.log", app_name, started.format("%Y-%m-%d_%H-%M-%S"))
}

/// Deletes every log of `app_name` in `log_dir` except the newest one and
/// returns how many were removed. Names embed a sortable timestamp, so the
/// newest file is the greatest name.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str) -> Result<usize, LoggerError> {
    let pattern = format!(
        "{}/{}_*.log",
        Pattern::escape(&log_dir.to_string_lossy()),
        Pattern::escape(app_name)
    );
    let mut log_files: Vec<PathBuf> = glob(&pattern)?.filter_map(Result::ok).collect();
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = 0;
    for old_file in log_files.iter().skip(1) {
        match fs::remove_file(old_file) {
            Ok(()) => removed += 1,
            // The subscriber is not installed yet.
            Err(e) => eprintln!("Failed to delete old log file {}: {}", old_file.display(), e),
        }
    }
    Ok(removed)
}

/// Installs the global subscriber and returns the guard of the file writer.
///
/// Keep the guard alive for the lifetime of the process; dropping it flushes
/// and stops the background writer.
///
/// # Errors
/// Fails when the directory cannot be prepared, the filter is invalid, or a
/// subscriber is already installed.
pub fn setup_logging(settings: &LogSettings) -> Result<WorkerGuard, LoggerError> {
    fs::create_dir_all(&settings.log_dir)?;
    cleanup_old_logs(&settings.log_dir, &settings.app_name)?;

    let file_name = log_file_name(&settings.app_name, Local::now());
    let appender = tracing_appender::rolling::never(&settings.log_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level_directive(&settings.level))
            .map_err(|e| LoggerError::FilterError(e.to_string()))?,
    };

    let json_layer = settings
        .json_file
        .then(|| fmt::layer().json().with_writer(file_writer.clone()));
    let text_layer = (!settings.json_file).then(|| fmt::layer().with_ansi(false).with_writer(file_writer));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| LoggerError::InitError(e.to_string()))?;

    Ok(guard)
}
