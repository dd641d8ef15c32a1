//! # Balance Stream
//!
//! A resilient client for server-pushed account balance updates.
//!
//! ## Overview
//!
//! `BalanceStream` keeps one WebSocket connection to a push endpoint, sends
//! an authenticated handshake every time the connection opens, and fans
//! every pushed balance out to any number of local subscribers. When the
//! connection drops it reconnects on its own with exponential backoff.
//!
//! ## Key Features
//!
//! - **Sync-First API**: The connection loop runs on a dedicated worker thread; no async/await required
//! - **Fault Isolation**: A panicking or slow subscriber never blocks delivery to the others
//! - **Fresh Credentials**: The token is read from the provider on every handshake, never cached
//! - **Bounded Backoff**: Retry delays double up to a cap and reset after a stable connection
//! - **Observable Connectivity**: Connection state is published through a watch channel
//!
//! ## Usage
//!
//! ```rust,ignore
//! use balance_stream::{BalanceStream, StreamConfig};
//! use credential_store::StaticToken;
//!
//! let stream = BalanceStream::start(
//!     StreamConfig::new("wss://billing.example.com/ws")?,
//!     StaticToken::new("tok123"),
//! )?;
//!
//! let subscription = stream.subscribe_to_balance(|balance| {
//!     println!("balance: {}", balance);
//! });
//!
//! // ...
//!
//! subscription.unsubscribe();
//! stream.shutdown()?;
//! ```
//!
//! ## Wire Format
//!
//! On open the client sends `{"subject":"handshake","body":{"token":<string|null>}}`.
//! The server pushes `{"subject":"balance","body":{"balance":<micro-units>}}`.
//! Frames with other subjects are ignored; undecodable frames are logged and
//! dropped without closing the connection.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod logging;
pub mod registry;
pub mod router;
pub mod transport;
pub mod types;

mod worker;

// Re-export main types for convenience
pub use backoff::BackoffPolicy;
pub use client::{BalanceStream, BalanceSubscription};
pub use config::{BackoffConfig, StreamConfig};
pub use error::{FrameError, Result, StreamError, TransportError};
pub use router::{MessageRouter, RouteOutcome};
pub use transport::{Connection, Inbound, Transport, WebSocketTransport};
pub use types::{Balance, ConnectionState, SubscriptionId, MICROS_PER_UNIT};

// Re-export the credential seam so callers need only one import
pub use credential_store::{CredentialProvider, StaticToken, TokenStore};

/// Commonly used types
pub mod prelude {
    pub use crate::client::{BalanceStream, BalanceSubscription};
    pub use crate::config::{BackoffConfig, StreamConfig};
    pub use crate::types::{Balance, ConnectionState};
    pub use credential_store::CredentialProvider;
}
