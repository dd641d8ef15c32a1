//! Logging setup for applications embedding the balance stream
//!
//! The library itself only emits `tracing` events. Binaries call
//! [`init_logging`] or [`init_logging_from_env`] once at startup to decide
//! where those events go.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable selecting the logging mode
pub const ENV_LOG_MODE: &str = "BALANCE_LOG_MODE";
/// Environment variable overriding the filter directive
pub const ENV_LOG_LEVEL: &str = "BALANCE_LOG_LEVEL";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics with source locations
    Debug,
    /// One JSON object per event, for log shippers
    Json,
}

impl LoggingMode {
    /// Parse a mode name as used in `BALANCE_LOG_MODE`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            "json" => Some(LoggingMode::Json),
            _ => None,
        }
    }

    fn default_directive(&self) -> &'static str {
        match self {
            LoggingMode::Silent => "off",
            LoggingMode::Development | LoggingMode::Json => "info",
            LoggingMode::Debug => "debug",
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}

/// Initialize logging with the specified mode
///
/// # Examples
///
/// ```rust,ignore
/// balance_stream::logging::init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `BALANCE_LOG_LEVEL`: Filter directive (e.g. `balance_stream=debug`)
/// - `RUST_LOG`: Used when `BALANCE_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    install(mode, |key| std::env::var(key).ok())
}

fn install<F>(mode: LoggingMode, lookup: F) -> Result<(), LoggingError>
where
    F: Fn(&str) -> Option<String>,
{
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Only modes that install a subscriber read the filter variables
    let filter = || create_env_filter(mode.default_directive(), &lookup);

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .with(filter()?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter()?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(filter()?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
    }
}

/// Initialize logging from `BALANCE_LOG_MODE`
///
/// Recognized values are `silent`, `development`, `debug` and `json`.
/// Anything else, or an unset variable, falls back to `fallback`.
pub fn init_logging_from_env(fallback: LoggingMode) -> Result<(), LoggingError> {
    let mode = std::env::var(ENV_LOG_MODE)
        .ok()
        .and_then(|name| LoggingMode::from_name(&name))
        .unwrap_or(fallback);

    init_logging(mode)
}

/// Check if a global subscriber has already been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

/// Build the filter from `BALANCE_LOG_LEVEL`, then `RUST_LOG`, then the default
fn create_env_filter<F>(default_directive: &str, lookup: F) -> Result<EnvFilter, LoggingError>
where
    F: Fn(&str) -> Option<String>,
{
    let directive = lookup(ENV_LOG_LEVEL)
        .or_else(|| lookup("RUST_LOG"))
        .unwrap_or_else(|| default_directive.to_string());

    EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
        directive,
        reason: e.to_string(),
    })
}
