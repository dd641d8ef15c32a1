use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use balance_stream::logging::LoggingMode;
use balance_stream::{BackoffConfig, StreamConfig};
use clap::{Parser, Subcommand};

/// Balance Monitor
///
/// Streams live account balance updates from a billing push endpoint and
/// manages the locally stored credential used for the handshake.
#[derive(Parser, Debug)]
#[command(name = "balance-monitor")]
#[command(about = "Watch live account balance updates")]
#[command(version)]
pub struct Args {
    /// Credential file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Log output: silent, development, debug or json
    #[arg(long, global = true, default_value = "development", value_parser = parse_log_mode)]
    pub log_mode: LoggingMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print every balance update until Ctrl-C
    Watch(WatchArgs),

    /// Store the tokens returned by a login
    Login {
        /// Bearer token sent in the handshake
        #[arg(long)]
        token: String,

        /// Refresh token
        #[arg(long)]
        refresh: Option<String>,

        /// Token expiry as reported by the identity service
        #[arg(long)]
        expires: Option<String>,
    },

    /// Remove all stored tokens
    Logout,

    /// Show whether a token is stored
    Status,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Push endpoint (ws:// or wss://); read from BALANCE_STREAM_URL when omitted
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Use this token instead of the stored one
    #[arg(short, long)]
    pub token: Option<String>,

    /// Delay before the first reconnect, in milliseconds
    #[arg(long)]
    pub initial_backoff_ms: Option<u64>,

    /// Upper bound on the reconnect delay in milliseconds (0 = unbounded)
    #[arg(long)]
    pub max_backoff_ms: Option<u64>,

    /// Keep doubling the delay forever, never resetting it
    #[arg(long, conflicts_with_all = ["max_backoff_ms"])]
    pub legacy_backoff: bool,
}

impl WatchArgs {
    /// Build the stream configuration from the environment plus overrides
    pub fn stream_config(&self) -> Result<StreamConfig> {
        let mut config = match &self.endpoint {
            Some(endpoint) => StreamConfig::new(endpoint)?,
            None => StreamConfig::from_env()
                .context("No --endpoint given and BALANCE_STREAM_URL is not usable")?,
        };

        if self.legacy_backoff {
            config.backoff = BackoffConfig::legacy(config.backoff.initial_delay);
        }
        if let Some(ms) = self.initial_backoff_ms {
            config.backoff.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_backoff_ms {
            config.backoff.max_delay = (ms > 0).then(|| Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_log_mode(value: &str) -> std::result::Result<LoggingMode, String> {
    LoggingMode::from_name(value).ok_or_else(|| {
        format!(
            "invalid log mode '{}'. Valid modes: silent, development, debug, json",
            value
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("balance-monitor").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_watch_with_endpoint() {
        let args = parse(&["watch", "--endpoint", "ws://localhost:8080/ws", "--token", "tok123"]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch command");
        };

        let config = watch.stream_config().unwrap();
        assert_eq!(config.endpoint.as_str(), "ws://localhost:8080/ws");
        assert_eq!(config.backoff, BackoffConfig::default());
        assert_eq!(watch.token.as_deref(), Some("tok123"));
    }

    #[test]
    fn test_backoff_overrides() {
        let args = parse(&[
            "watch",
            "-e",
            "wss://billing.example.com/ws",
            "--initial-backoff-ms",
            "250",
            "--max-backoff-ms",
            "0",
        ]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch command");
        };

        let config = watch.stream_config().unwrap();
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(250));
        assert_eq!(config.backoff.max_delay, None);
    }

    #[test]
    fn test_legacy_backoff_flag() {
        let args = parse(&["watch", "-e", "ws://localhost/ws", "--legacy-backoff"]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch command");
        };

        let config = watch.stream_config().unwrap();
        assert_eq!(config.backoff, BackoffConfig::legacy(Duration::from_secs(1)));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let args = parse(&["watch", "-e", "http://localhost/ws"]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch command");
        };
        assert!(watch.stream_config().is_err());
    }

    #[rstest]
    #[case("silent", LoggingMode::Silent)]
    #[case("development", LoggingMode::Development)]
    #[case("debug", LoggingMode::Debug)]
    #[case("json", LoggingMode::Json)]
    fn test_log_modes(#[case] name: &str, #[case] expected: LoggingMode) {
        let args = parse(&["--log-mode", name, "status"]);
        assert_eq!(args.log_mode, expected);
    }

    #[test]
    fn test_rejects_unknown_log_mode() {
        let result = Args::try_parse_from(["balance-monitor", "--log-mode", "loud", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_login_arguments() {
        let args = parse(&["--credentials", "/tmp/creds.json", "login", "--token", "abc"]);
        assert_eq!(args.credentials, Some(PathBuf::from("/tmp/creds.json")));
        match args.command {
            Command::Login {
                token,
                refresh,
                expires,
            } => {
                assert_eq!(token, "abc");
                assert_eq!(refresh, None);
                assert_eq!(expires, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
