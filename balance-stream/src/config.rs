//! Configuration types for the balance-stream crate
//!
//! This module defines the configuration that controls the stream's
//! connection behavior: the push endpoint, reconnect backoff, connect
//! timeout, frame limits and subscriber dispatch diagnostics.

use std::time::Duration;

use url::Url;

use crate::error::{Result, StreamError};

/// Environment variable holding the push endpoint URL
pub const ENV_URL: &str = "BALANCE_STREAM_URL";
/// Environment variable overriding the initial backoff delay, in milliseconds
pub const ENV_INITIAL_BACKOFF_MS: &str = "BALANCE_STREAM_INITIAL_BACKOFF_MS";
/// Environment variable overriding the backoff cap in milliseconds (`0` = unbounded)
pub const ENV_MAX_BACKOFF_MS: &str = "BALANCE_STREAM_MAX_BACKOFF_MS";
/// Environment variable overriding the reset threshold in milliseconds (`0` = never)
pub const ENV_RESET_AFTER_MS: &str = "BALANCE_STREAM_RESET_AFTER_MS";
/// Environment variable overriding the connect timeout, in milliseconds
pub const ENV_CONNECT_TIMEOUT_MS: &str = "BALANCE_STREAM_CONNECT_TIMEOUT_MS";

/// Reconnect backoff configuration
///
/// The delay starts at `initial_delay` and doubles after every closed
/// connection. `max_delay` caps it and `reset_after` returns it to
/// `initial_delay` once a connection has stayed open long enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    /// Default: 1 second
    pub initial_delay: Duration,

    /// Upper bound on the delay, `None` for unbounded growth
    /// Default: 60 seconds
    pub max_delay: Option<Duration>,

    /// Open duration after which the delay resets, `None` to never reset
    /// Default: 30 seconds
    pub reset_after: Option<Duration>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Some(Duration::from_secs(60)),
            reset_after: Some(Duration::from_secs(30)),
        }
    }
}

impl BackoffConfig {
    /// Create a BackoffConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Unbounded doubling with no reset, starting at `initial_delay`
    ///
    /// Once any outage has happened the delay only grows for the lifetime
    /// of the stream.
    pub fn legacy(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: None,
            reset_after: None,
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Initial backoff delay must be greater than 0".to_string(),
            ));
        }

        if let Some(max) = self.max_delay {
            if max < self.initial_delay {
                return Err(StreamError::Configuration(
                    "Invalid backoff: max delay must not be less than initial delay".to_string(),
                ));
            }
        }

        if self.reset_after == Some(Duration::ZERO) {
            return Err(StreamError::Configuration(
                "Backoff reset threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, max: Option<Duration>) -> Self {
        self.max_delay = max;
        self
    }

    pub fn with_reset_after(mut self, threshold: Option<Duration>) -> Self {
        self.reset_after = threshold;
        self
    }
}

/// Configuration for the balance stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint pushing balance events (`ws://` or `wss://`)
    pub endpoint: Url,

    /// Reconnect backoff behavior
    pub backoff: BackoffConfig,

    /// Maximum time to wait for a connection to establish
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Largest inbound frame that will be decoded
    /// Default: 64 KiB
    pub max_frame_bytes: usize,

    /// Subscriber callbacks running longer than this are logged
    /// Default: 100 milliseconds
    pub slow_callback_threshold: Duration,
}

impl StreamConfig {
    /// Create a StreamConfig for `endpoint` with default values
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StreamError::Configuration(format!("Invalid endpoint URL '{}': {}", endpoint, e))
        })?;

        let config = Self {
            endpoint,
            backoff: BackoffConfig::default(),
            connect_timeout: Duration::from_secs(10),
            max_frame_bytes: 64 * 1024,
            slow_callback_threshold: Duration::from_millis(100),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a StreamConfig from `BALANCE_STREAM_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a StreamConfig from an arbitrary variable lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_URL).ok_or_else(|| {
            StreamError::Configuration(format!("{} is not set", ENV_URL))
        })?;

        let mut config = Self::new(&endpoint)?;

        if let Some(ms) = parse_millis(&lookup, ENV_INITIAL_BACKOFF_MS)? {
            config.backoff.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_millis(&lookup, ENV_MAX_BACKOFF_MS)? {
            config.backoff.max_delay = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_millis(&lookup, ENV_RESET_AFTER_MS)? {
            config.backoff.reset_after = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_millis(&lookup, ENV_CONNECT_TIMEOUT_MS)? {
            config.connect_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        match self.endpoint.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(StreamError::Configuration(format!(
                    "Unsupported endpoint scheme '{}': expected ws or wss",
                    other
                )));
            }
        }

        if self.connect_timeout == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_frame_bytes == 0 {
            return Err(StreamError::Configuration(
                "Max frame size must be greater than 0".to_string(),
            ));
        }

        self.backoff.validate()
    }

    // Builder pattern methods for fluent configuration

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    pub fn with_slow_callback_threshold(mut self, threshold: Duration) -> Self {
        self.slow_callback_threshold = threshold;
        self
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            StreamError::Configuration(format!(
                "{} must be a whole number of milliseconds, got '{}'",
                key, raw
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::new("wss://billing.example.com/ws").unwrap();
        assert_eq!(config.endpoint.as_str(), "wss://billing.example.com/ws");
        assert_eq!(config.backoff, BackoffConfig::default());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_frame_bytes, 64 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(StreamConfig::new("not a url").is_err());

        let result = StreamConfig::new("https://billing.example.com/ws");
        assert!(matches!(result, Err(StreamError::Configuration(msg)) if msg.contains("https")));
    }

    #[test]
    fn test_backoff_validation() {
        assert!(BackoffConfig::default().validate().is_ok());
        assert!(BackoffConfig::legacy(Duration::from_secs(1)).validate().is_ok());

        let zero = BackoffConfig::default().with_initial_delay(Duration::ZERO);
        assert!(zero.validate().is_err());

        let inverted = BackoffConfig::default()
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Some(Duration::from_secs(5)));
        assert!(inverted.validate().is_err());

        let zero_reset = BackoffConfig::default().with_reset_after(Some(Duration::ZERO));
        assert!(zero_reset.validate().is_err());
    }

    #[test]
    fn test_legacy_preset() {
        let legacy = BackoffConfig::legacy(Duration::from_millis(1000));
        assert_eq!(legacy.initial_delay, Duration::from_millis(1000));
        assert_eq!(legacy.max_delay, None);
        assert_eq!(legacy.reset_after, None);
    }

    #[test]
    fn test_builder_pattern() {
        let config = StreamConfig::new("ws://localhost:8080/ws")
            .unwrap()
            .with_backoff(BackoffConfig::legacy(Duration::from_millis(500)))
            .with_connect_timeout(Duration::from_secs(3))
            .with_max_frame_bytes(4096)
            .with_slow_callback_threshold(Duration::from_millis(20));

        assert_eq!(config.backoff.initial_delay, Duration::from_millis(500));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.max_frame_bytes, 4096);
        assert_eq!(config.slow_callback_threshold, Duration::from_millis(20));
        assert!(config.validate().is_ok());

        let invalid = config.with_max_frame_bytes(0);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_from_lookup_requires_url() {
        let result = StreamConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(StreamError::Configuration(msg)) if msg.contains(ENV_URL)));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = StreamConfig::from_lookup(lookup(&[
            (ENV_URL, "ws://localhost:9000/ws"),
            (ENV_INITIAL_BACKOFF_MS, "250"),
            (ENV_MAX_BACKOFF_MS, "0"),
            (ENV_RESET_AFTER_MS, "5000"),
            (ENV_CONNECT_TIMEOUT_MS, "1500"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint.as_str(), "ws://localhost:9000/ws");
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(250));
        assert_eq!(config.backoff.max_delay, None);
        assert_eq!(config.backoff.reset_after, Some(Duration::from_secs(5)));
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let result = StreamConfig::from_lookup(lookup(&[
            (ENV_URL, "ws://localhost:9000/ws"),
            (ENV_INITIAL_BACKOFF_MS, "soon"),
        ]));
        assert!(
            matches!(result, Err(StreamError::Configuration(msg)) if msg.contains(ENV_INITIAL_BACKOFF_MS))
        );
    }
}
