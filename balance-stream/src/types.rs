//! Core types for the balance-stream crate.

use std::time::Duration;

/// Number of micro-units in one unit of the base currency.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// An account balance in micro-units of the base currency.
///
/// Each pushed balance is an authoritative replacement for the previous one,
/// never a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Balance(i64);

impl Balance {
    /// Create a balance from an amount in micro-units.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Get the raw amount in micro-units.
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Get the amount in whole units of the base currency.
    pub fn to_major_units(&self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT as f64
    }

    /// Whether the account is overdrawn.
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for Balance {
    fn from(micros: i64) -> Self {
        Self(micros)
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MICROS_PER_UNIT as u64;
        write!(f, "{}{}.{:06}", sign, abs / unit, abs % unit)
    }
}

/// Unique identifier for a balance subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Create a new SubscriptionId with the given value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle state of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in progress
    Connecting,
    /// The transport is established and the handshake has been sent
    Open,
    /// The last connection closed or failed; a retry is scheduled
    Closed {
        /// Delay before the next attempt
        retry_in: Duration,
    },
    /// The stream was shut down and will not reconnect
    Stopped,
}

impl ConnectionState {
    /// Whether balance updates can currently arrive.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed { retry_in } => write!(f, "closed (retry in {:?})", retry_in),
            ConnectionState::Stopped => write!(f, "stopped"),
        }
    }
}
