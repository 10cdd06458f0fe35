//! Errand Logging Bootstrap
//!
//! Installs the process-wide `tracing` subscriber. Library crates only emit
//! events and spans; binaries call [`init`] once at startup.
//!
//! # Usage
//!
//! ```rust
//! use errand_log::{Format, Level, LogConfig};
//!
//! let config = LogConfig {
//!     level: Level::Debug,
//!     format: Format::Compact,
//!     ..LogConfig::default()
//! };
//! // Fails only if another subscriber is already installed.
//! let _ = config.try_init();
//!
//! tracing::info!(workers = 4, "starting dispatcher");
//! ```
//!
//! # Environment Variables
//!
//! - `ERRAND_DEBUG=1` - Enable debug logging
//! - `ERRAND_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `ERRAND_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `ERRAND_LOG_COLOR=1|0` - Enable/disable colors
//! - `RUST_LOG` - Full filter directives, overrides the level when set

use std::env;
use std::io::IsTerminal;
use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    Debug,
    Info,
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human friendly
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging errors.
#[derive(Debug, Error)]
pub enum LogError {
    /// Filter directives could not be parsed
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber is already installed
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include the event target
    pub targets: bool,
    /// Filter directives that replace `level`, usually from `RUST_LOG`
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false, // JSON output doesn't use colors
            targets: true,
            directives: None,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("ERRAND_DEBUG").unwrap_or(false);

        let level = lookup("ERRAND_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("ERRAND_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("ERRAND_LOG_COLOR")
            .unwrap_or_else(|| format != Format::Json && std::io::stderr().is_terminal());

        let directives = lookup("RUST_LOG").filter(|s| !s.trim().is_empty());

        Self {
            debug,
            level,
            format,
            color,
            targets: true,
            directives,
        }
    }

    /// Filter built from `directives`, or from `level` when there are none.
    pub fn filter(&self) -> Result<EnvFilter, LogError> {
        let directives = self
            .directives
            .as_deref()
            .unwrap_or_else(|| self.level.as_directive());

        EnvFilter::try_new(directives).map_err(|e| LogError::InvalidFilter(e.to_string()))
    }

    /// Install this configuration as the global subscriber.
    pub fn try_init(&self) -> Result<(), LogError> {
        let filter = self.filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            Format::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(self.targets)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            Format::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_ansi(self.color)
                        .with_target(self.targets)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            Format::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_ansi(self.color)
                        .with_target(self.targets)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };

        result.map_err(|e| LogError::Init(e.to_string()))
    }
}

/// Install the subscriber described by the environment.
///
/// An already installed subscriber is left in place.
pub fn init() {
    let _ = try_init();
}

/// Install the subscriber described by the environment, reporting failures.
pub fn try_init() -> Result<(), LogError> {
    LogConfig::from_env().try_init()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LogConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("invalid"), None);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("pretty"), Some(Format::Pretty));
        assert_eq!(Format::parse("Compact"), Some(Format::Compact));
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("invalid"), None);
    }

    #[test]
    fn test_defaults_without_env() {
        let config = config(&[]);

        assert!(!config.debug);
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.format, Format::Json);
        assert!(!config.color);
        assert_eq!(config.directives, None);
    }

    #[test]
    fn test_debug_flag_lowers_level() {
        assert_eq!(config(&[("ERRAND_DEBUG", "1")]).level, Level::Debug);
        assert_eq!(config(&[("ERRAND_DEBUG", "true")]).level, Level::Debug);

        // An explicit level wins over the debug flag.
        let explicit = config(&[("ERRAND_DEBUG", "1"), ("ERRAND_LOG_LEVEL", "warn")]);
        assert_eq!(explicit.level, Level::Warn);
    }

    #[test]
    fn test_format_and_color() {
        let config = config(&[("ERRAND_LOG_FORMAT", "compact"), ("ERRAND_LOG_COLOR", "0")]);

        assert_eq!(config.format, Format::Compact);
        assert!(!config.color);
    }

    #[test]
    fn test_rust_log_overrides_level() {
        let config = config(&[("ERRAND_LOG_LEVEL", "error"), ("RUST_LOG", "errand_dispatch=debug")]);

        assert_eq!(config.directives.as_deref(), Some("errand_dispatch=debug"));
        assert!(config.filter().is_ok());
    }

    #[test]
    fn test_invalid_filter() {
        let config = LogConfig {
            directives: Some("errand=notalevel".to_string()),
            ..LogConfig::default()
        };

        assert!(matches!(config.filter(), Err(LogError::InvalidFilter(_))));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig {
            format: Format::Compact,
            ..LogConfig::default()
        };

        // Another test may have installed a subscriber first; either way the
        // second call must fail.
        let _ = config.try_init();
        assert!(matches!(config.try_init(), Err(LogError::Init(_))));
    }
}
