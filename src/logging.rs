//! Structured logging setup.
//!
//! Events follow the `event = "janitor.<area>.<action>"` field convention so
//! JSON output can be filtered without parsing messages.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use camino::Utf8Path;
use cap_std::fs::OpenOptions;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt};

/// Minimum level emitted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Verbosity {
    /// Everything.
    Trace,
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl Verbosity {
    /// Returns the equivalent level filter.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "must be one of trace, debug, info, warn, error (got '{other}')"
            )),
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("must be 'text' or 'json' (got '{other}')")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// How and where to log.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LogOptions {
    /// Minimum level, unless `RUST_LOG` overrides it.
    pub verbosity: Verbosity,
    /// Output format.
    pub format: LogFormat,
    /// File to append to; standard error when `None`.
    pub file: Option<String>,
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// Raised when the log file cannot be opened.
    #[error("failed to open log file `{path}`: {message}")]
    Open {
        /// Configured path.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when a global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] when the log file cannot be opened or a
/// subscriber is already installed.
pub fn init(options: &LogOptions) -> Result<(), LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(options.verbosity.level_filter().into())
        .from_env_lossy();
    let writer = match options.file.as_deref() {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let layer = subscriber_fmt::layer()
        .with_writer(writer)
        .with_ansi(options.file.is_none());
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match options.format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    installed.map_err(|err| LoggingError::Install(err.to_string()))
}

/// Opens `path` for appending, creating it when missing.
///
/// # Errors
///
/// Returns [`LoggingError::Open`] when the parent directory or file cannot
/// be opened.
pub fn open_log_file(path: &str) -> Result<std::fs::File, LoggingError> {
    let open_error = |message: String| LoggingError::Open {
        path: path.to_owned(),
        message,
    };
    let log_path = Utf8Path::new(path);
    let file_name = log_path
        .file_name()
        .ok_or_else(|| open_error(String::from("path has no file name")))?;
    let parent = match log_path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| open_error(err.to_string()))?;
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    dir.open_with(file_name, &options)
        .map(|file| file.into_std())
        .map_err(|err| open_error(err.to_string()))
}
