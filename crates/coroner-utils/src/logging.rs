//! # Logging Utilities
//!
//! Logging infrastructure for Coroner using `tracing`.
//!
//! Inspection output goes to stdout, so console logging always writes to
//! stderr. Supported:
//! - Multiple output formats (JSON for machine consumption, pretty for people)
//! - Environment variable configuration
//! - Log level filtering with per-crate directives
//! - Console plus daily-rolling file output, or file output only
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coroner_utils::init_logging;
//!
//! // Initialize with default settings (reads from RUST_LOG env var)
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Inspection started");
//! tracing::debug!("Debug information");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=coroner_core=trace`)
//! - `CORONER_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `CORONER_LOG_FILE`: Optional path of a daily-rolling log file, written in
//!   addition to the console
//!
//! Keep the returned [`LoggingGuard`] alive for as long as logs should be
//! written; dropping it flushes and closes the log file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_VAR: &str = "CORONER_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const LOG_FILE_VAR: &str = "CORONER_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" | "human" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
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

/// Keeps the background log-file writer alive
///
/// Dropping the guard flushes buffered lines to the file. For console-only
/// logging it holds nothing.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// Reads:
/// - `RUST_LOG`: Log level filter (e.g., `warn`, `coroner_core=debug`), `warn` if unset
/// - `CORONER_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `CORONER_LOG_FILE`: Optional path of an additional daily-rolling log file
///
/// ## Example
///
/// ```rust,no_run
/// use coroner_utils::init_logging;
///
/// let _guard = init_logging().expect("Failed to initialize logging");
/// tracing::info!("Inspection started");
/// ```
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `CORONER_LOG_FORMAT` holds an unknown format
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_console(format_from_env()?, None)
}

/// Initialize logging with an explicit level and format
///
/// The level overrides `RUST_LOG`; `CORONER_LOG_FILE` is still honoured.
///
/// ## Example
///
/// ```rust,no_run
/// use coroner_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_console(format, Some(level.into()))
}

/// Initialize file-only logging (nothing on the console)
///
/// If `path` is an existing directory, logs go to
/// `<path>/YYYY-MM-DD-coroner.log`. The parent directory is created if
/// needed. Returns the file being written and the guard.
///
/// ## Example
///
/// ```rust,no_run
/// use coroner_utils::{LogFormat, LogLevel, init_logging_to_file};
///
/// let (_guard, file) = init_logging_to_file("/var/tmp", Some(LogLevel::Debug), LogFormat::Json)
///     .expect("Failed to initialize logging");
/// eprintln!("logging to {}", file.display());
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log directory
/// cannot be created.
pub fn init_logging_to_file(
    path: impl AsRef<Path>,
    level: Option<LogLevel>,
    format: LogFormat,
) -> Result<(LoggingGuard, PathBuf), LoggingError>
{
    let path = path.as_ref();
    let log_file = if path.is_dir() {
        path.join(format!("{}-coroner.log", Utc::now().format("%Y-%m-%d")))
    } else {
        path.to_path_buf()
    };
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // The date is already in the default file name, so never roll
    let (writer, guard) = non_blocking_file(&log_file, false);
    let layer = fmt_layer(format, writer, false, env_filter(level.map(Into::into)));
    install(vec![layer])?;

    Ok((LoggingGuard { _file: Some(guard) }, log_file))
}

fn init_console(format: LogFormat, explicit_level: Option<Level>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![fmt_layer(format, io::stderr, true, env_filter(explicit_level))];
    let mut guard = LoggingGuard::default();

    if let Some(file_path) = env::var_os(LOG_FILE_VAR).map(PathBuf::from) {
        let (writer, file_guard) = non_blocking_file(&file_path, true);
        layers.push(fmt_layer(format, writer, false, env_filter(explicit_level)));
        guard._file = Some(file_guard);
    }

    install(layers)?;
    Ok(guard)
}

fn format_from_env() -> Result<LogFormat, LoggingError>
{
    match env::var(LOG_FORMAT_VAR) {
        Ok(value) => LogFormat::from_str(&value).map_err(LoggingError::InvalidFormat),
        Err(_) => Ok(LogFormat::default()),
    }
}

/// Build the level filter
///
/// Priority:
/// 1. An explicit level (from a CLI flag)
/// 2. `RUST_LOG`, which may carry per-crate directives
/// 3. `warn`, so a quiet inspection prints only its results
fn env_filter(explicit_level: Option<Level>) -> EnvFilter
{
    if let Some(level) = explicit_level {
        return EnvFilter::new(level.to_string());
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
}

fn non_blocking_file(path: &Path, rolling: bool) -> (NonBlocking, WorkerGuard)
{
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path.file_name().unwrap_or_default();
    if rolling {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name))
    } else {
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
    }
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn install(layers: Vec<BoxedLayer>) -> Result<(), LoggingError>
{
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("text").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::from_str("xml").is_err());
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
    }

    #[test]
    fn test_explicit_level_wins()
    {
        let filter = env_filter(Some(Level::TRACE));
        assert_eq!(filter.max_level_hint(), Some(tracing::level_filters::LevelFilter::TRACE));
    }
}
