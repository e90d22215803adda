//! Logging setup.
//!
//! Logs go to stderr through `tracing-subscriber`. `RUST_LOG` takes
//! precedence; otherwise the level comes from the CLI verbosity flags.
//! Signature material and secrets are never logged above debug level.

use tracing_subscriber::{fmt, EnvFilter};

/// Log level for the gate and its HTTP stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Error level - least verbose
    Error,
}

impl LogLevel {
    /// Derive a level from the `-v` count and `--quiet` flag.
    /// Quiet wins; 0 = Info, 1 = Debug, 2+ = Trace.
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        if quiet {
            return LogLevel::Warn;
        }
        match verbosity {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Filter directive for this level.
    ///
    /// Request spans from `tower_http` are only shown from debug upwards.
    pub fn directive(self) -> String {
        let http_level = match self {
            LogLevel::Trace | LogLevel::Debug => self.as_str(),
            _ => "warn",
        };
        format!("{},tower_http={}", self.as_str(), http_level)
    }
}

/// Configuration for the subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamps: bool,
    /// Whether to include the target (module path)
    pub with_target: bool,
    /// Whether to use ANSI colors
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Create a configuration from CLI flags
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        Self {
            level: LogLevel::from_flags(verbosity, quiet),
            ..Self::default()
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Set whether to use ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install the global subscriber.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directive()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_ansi(config.with_ansi);

    // Err only means a subscriber is already installed
    let _ = if config.with_timestamps {
        subscriber.try_init()
    } else {
        subscriber.without_time().try_init()
    };
}
