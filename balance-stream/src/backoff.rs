//! Reconnect delay computation.
//!
//! The policy is consulted exactly once per closed or failed connection.
//! Each call hands out the stored delay and doubles it for the next outage.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Exponential backoff state for one stream.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current: Duration,
}

impl BackoffPolicy {
    /// Create a policy starting at the configured initial delay.
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.initial_delay;
        Self { config, current }
    }

    /// Take the delay for the retry that is about to be scheduled.
    ///
    /// The stored delay then doubles, saturating at `max_delay` when one is
    /// configured and at `Duration::MAX` otherwise.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.capped(self.current);
        self.current = self.capped(self.current.saturating_mul(2));
        delay
    }

    /// Report how long the connection that just closed had been open.
    ///
    /// Resets the delay when the connection lasted at least `reset_after`.
    /// Returns whether a reset happened.
    pub fn record_connection(&mut self, open_for: Duration) -> bool {
        match self.config.reset_after {
            Some(threshold) if open_for >= threshold => {
                if self.current != self.config.initial_delay {
                    tracing::debug!(
                        "Connection held for {:?}, resetting backoff from {:?}",
                        open_for,
                        self.current
                    );
                }
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Return the stored delay to its initial value.
    pub fn reset(&mut self) {
        self.current = self.config.initial_delay;
    }

    /// The delay the next call to [`next_delay`](Self::next_delay) will return.
    pub fn current_delay(&self) -> Duration {
        self.capped(self.current)
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    fn capped(&self, delay: Duration) -> Duration {
        match self.config.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
