//! # Logging Utilities
//!
//! Logging infrastructure for Glint using `tracing`.
//!
//! Two modes matter here:
//! - console logging for the build-time half (table emission inside the
//!   code generator), and
//! - file-only logging for the debug-time half, which runs inside a host
//!   debugger's command hooks where stdout carries command output and must
//!   stay clean.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: log level filter (e.g. `debug`, `glint_core=debug`)
//! - `GLINT_LOG_FORMAT`: output format (`json` or `pretty`, default: `pretty`)
//! - `GLINT_LOG_FILE`: optional path to a log file alongside the console
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glint_utils::init_logging;
//!
//! init_logging().expect("Failed to initialize logging");
//! tracing::info!("table emission started");
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default for development)
    Pretty,
    /// JSON format (default for production)
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Initialize console logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: log level filter
/// - `GLINT_LOG_FORMAT`: output format (`json` or `pretty`, default: `pretty`)
/// - `GLINT_LOG_FILE`: optional path to a log file alongside the console
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging
/// fails (when `GLINT_LOG_FILE` is set).
pub fn init_logging() -> Result<(), LoggingError>
{
    let format = env::var("GLINT_LOG_FORMAT")
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or(LogFormat::Pretty);

    let default_level = env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse::<LogLevel>()
        .map(Into::into)
        .unwrap_or(Level::INFO);

    init_logging_internal(format, default_level)
}

/// Initialize console logging with explicit level and format
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    init_logging_internal(format, level.into())
}

/// Initialize logging for debugger-hook mode (file-only, no stdout)
///
/// The runtime's command hooks own stdout: it carries backtraces, listings,
/// and breakpoint messages for the host debugger's user. Logs go to
/// `~/.glint/YYYY-MM-DD-glint.log`, or `/tmp/YYYY-MM-DD-glint.log` when no
/// home directory is available.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file
/// cannot be created.
pub fn init_logging_for_debugger(level: Option<LogLevel>) -> Result<PathBuf, LoggingError>
{
    let today = Utc::now().format("%Y-%m-%d");
    let log_file = if let Ok(home) = env::var("HOME") {
        let glint_dir = PathBuf::from(home).join(".glint");
        std::fs::create_dir_all(&glint_dir).map_err(LoggingError::FileError)?;
        glint_dir.join(format!("{today}-glint.log"))
    } else {
        PathBuf::from("/tmp").join(format!("{today}-glint.log"))
    };

    init_logging_file_only(log_file.clone(), level.map(Into::into))?;
    Ok(log_file)
}

/// Internal initialization for console (plus optional file) logging
#[allow(clippy::unnecessary_wraps)]
fn init_logging_internal(format: LogFormat, default_level: Level) -> Result<(), LoggingError>
{
    // RUST_LOG can override the default level with more specific filters
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let log_file = env::var("GLINT_LOG_FILE").ok().map(PathBuf::from);

    match (format, log_file) {
        (LogFormat::Pretty, None) => {
            let console = pretty_layer(io::stdout, true).with_filter(env_filter);
            Registry::default().with(console).init();
        }
        (LogFormat::Pretty, Some(path)) => {
            let console = pretty_layer(io::stdout, true).with_filter(env_filter.clone());
            let file = pretty_layer(file_writer(&path), false).with_filter(env_filter);
            Registry::default().with(console).with(file).init();
        }
        (LogFormat::Json, None) => {
            let console = json_layer(io::stdout).with_filter(env_filter);
            Registry::default().with(console).init();
        }
        (LogFormat::Json, Some(path)) => {
            let console = json_layer(io::stdout).with_filter(env_filter.clone());
            let file = json_layer(file_writer(&path)).with_filter(env_filter);
            Registry::default().with(console).with(file).init();
        }
    }

    Ok(())
}

/// Internal initialization for file-only logging (debugger-hook mode)
#[allow(clippy::unnecessary_wraps)]
fn init_logging_file_only(log_file: PathBuf, explicit_level: Option<Level>) -> Result<(), LoggingError>
{
    // Priority: explicit level, then RUST_LOG, then INFO.
    let env_filter = if let Some(level) = explicit_level {
        EnvFilter::new(level.to_string())
    } else if let Ok(rust_log) = env::var("RUST_LOG") {
        EnvFilter::try_new(&rust_log).unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    } else {
        EnvFilter::new(Level::INFO.to_string())
    };

    let file = pretty_layer(file_writer(&log_file), false).with_filter(env_filter);
    Registry::default().with(file).init();
    Ok(())
}

/// Non-blocking writer appending to `path`; rolling is unnecessary because
/// debugger-mode filenames already carry the date.
fn file_writer(path: &std::path::Path) -> tracing_appender::non_blocking::NonBlocking
{
    let appender = tracing_appender::rolling::never(
        path.parent().unwrap_or(&PathBuf::from(".")),
        path.file_name().unwrap_or_default(),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    // Keep the flush guard alive for the process lifetime.
    std::mem::forget(guard);
    non_blocking
}

fn pretty_layer<S, W>(writer: W, ansi: bool) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(ansi)
        .with_writer(writer)
}

fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(writer)
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
