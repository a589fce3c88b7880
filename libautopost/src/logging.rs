//! Logging setup for the autopost binary
//!
//! Output goes to stderr in one of three formats. `RUST_LOG` takes
//! precedence over the level chosen on the command line.
//!
//! # Examples
//!
//! ```no_run
//! use libautopost::logging::{LogFormat, LogLevel, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, LogLevel::Debug).init();
//! ```

use std::str::FromStr;

/// Environment variable consulted when no `--log-format` is given
pub const ENV_LOG_FORMAT: &str = "AUTOPOST_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    #[default]
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Operator-facing verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!(
                "Invalid log level: '{}'. Valid options: debug, info, warning, error",
                s
            )),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: LogLevel) -> Self {
        Self { format, level }
    }

    /// Install the global subscriber
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been installed
    pub fn init(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_filter()));

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_target(true)
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .init();
            }
        }
    }
}

/// Resolve the log format from an explicit choice or `AUTOPOST_LOG_FORMAT`
///
/// Unrecognised environment values fall back to text.
pub fn resolve_format(explicit: Option<LogFormat>) -> LogFormat {
    explicit.unwrap_or_else(|| {
        std::env::var(ENV_LOG_FORMAT)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    })
}
