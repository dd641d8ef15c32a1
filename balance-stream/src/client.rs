//! Sync-first balance stream handle
//!
//! Provides a fully synchronous API for subscribing to balance updates.
//! The connection loop runs on a background worker thread.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use credential_store::CredentialProvider;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::StreamConfig;
use crate::connection::ConnectionManager;
use crate::error::{Result, StreamError};
use crate::registry::SubscriberRegistry;
use crate::router::MessageRouter;
use crate::transport::{Transport, WebSocketTransport};
use crate::types::{Balance, ConnectionState, SubscriptionId};
use crate::worker::spawn_stream_worker;

/// Owned handle to the balance stream
///
/// Construct one per process at startup and pass it to whatever needs
/// balance updates. Dropping the handle shuts the stream down.
///
/// # Example
///
/// ```rust,ignore
/// use balance_stream::{BalanceStream, StreamConfig};
/// use credential_store::TokenStore;
/// use std::sync::Arc;
///
/// let credentials = Arc::new(TokenStore::open_default()?);
/// let stream = BalanceStream::start(
///     StreamConfig::new("wss://billing.example.com/ws")?,
///     credentials.clone(),
/// )?;
///
/// let subscription = stream.subscribe_to_balance(|balance| {
///     println!("balance is now {}", balance);
/// });
///
/// // later
/// subscription.unsubscribe();
/// stream.shutdown()?;
/// ```
pub struct BalanceStream {
    /// Live subscriptions, shared with the worker's router
    registry: Arc<SubscriberRegistry>,

    /// Latest connection state published by the worker
    state_rx: watch::Receiver<ConnectionState>,

    /// Flipped to `true` to stop the worker
    shutdown_tx: watch::Sender<bool>,

    /// Background worker handle, taken on shutdown
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BalanceStream {
    /// Start streaming from `config.endpoint` over WebSocket
    ///
    /// This is a synchronous operation - no `.await` required. Connection
    /// failures are not reported here; the worker keeps retrying in the
    /// background and reports progress through
    /// [`watch_connection_state`](Self::watch_connection_state).
    pub fn start<C>(config: StreamConfig, credentials: C) -> Result<Self>
    where
        C: CredentialProvider + 'static,
    {
        Self::start_with_transport(config, credentials, Arc::new(WebSocketTransport::new()))
    }

    /// Start streaming over a custom transport
    pub fn start_with_transport<C>(
        config: StreamConfig,
        credentials: C,
        transport: Arc<dyn Transport>,
    ) -> Result<Self>
    where
        C: CredentialProvider + 'static,
    {
        config.validate()?;

        let registry = Arc::new(SubscriberRegistry::new(config.slow_callback_threshold));
        let router = MessageRouter::new(Arc::clone(&registry), config.max_frame_bytes);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let manager =
            ConnectionManager::new(config, transport, Arc::new(credentials), router, state_tx);
        let worker = spawn_stream_worker(manager, shutdown_rx)?;

        Ok(Self {
            registry,
            state_rx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Register a callback for every pushed balance
    ///
    /// Callbacks run on the stream's worker thread and should return quickly.
    /// A panicking callback is logged and skipped; other subscribers still
    /// receive the update.
    pub fn subscribe_to_balance<F>(&self, callback: F) -> BalanceSubscription
    where
        F: Fn(Balance) + Send + Sync + 'static,
    {
        let id = self.registry.subscribe(callback);
        BalanceSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// The most recently published connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A receiver notified on every connection state change
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Number of live balance subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the worker is still running
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the stream and wait for the worker to exit
    ///
    /// Closes the open connection, cancels any pending retry and leaves the
    /// state at [`ConnectionState::Stopped`]. Subscriptions are kept but
    /// receive nothing further. Calling this more than once is a no-op.
    /// Called automatically on drop.
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send_replace(true);

        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };

        // A subscriber calling shutdown runs on the worker itself
        if handle.thread().id() == thread::current().id() {
            tracing::debug!("Shutdown requested from stream worker; not joining");
            return Ok(());
        }

        handle
            .join()
            .map_err(|_| StreamError::Shutdown("stream worker panicked".to_string()))
    }
}

impl Drop for BalanceStream {
    fn drop(&mut self) {
        tracing::debug!(
            "BalanceStream dropping, {} active subscriptions",
            self.registry.len()
        );

        if let Err(e) = self.shutdown() {
            tracing::warn!("Error shutting down balance stream: {}", e);
        }
    }
}

impl std::fmt::Debug for BalanceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceStream")
            .field("state", &self.connection_state())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle to one balance subscription
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) explicitly.
#[derive(Debug, Clone)]
pub struct BalanceSubscription {
    id: SubscriptionId,
    registry: Weak<SubscriberRegistry>,
}

impl BalanceSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving balance updates
    ///
    /// Returns `true` if this call removed the subscription. Repeated calls,
    /// or calls after the stream was dropped, return `false`.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.unsubscribe(self.id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::Connection;
    use async_trait::async_trait;
    use credential_store::StaticToken;
    use std::time::Duration;
    use url::Url;

    /// Transport whose connection attempts never complete
    struct PendingTransport;

    #[async_trait]
    impl Transport for PendingTransport {
        async fn connect(&self, _endpoint: &Url) -> std::result::Result<Box<dyn Connection>, TransportError> {
            std::future::pending().await
        }
    }

    fn start() -> BalanceStream {
        let config = StreamConfig::new("ws://127.0.0.1:9/ws").unwrap();
        BalanceStream::start_with_transport(
            config,
            StaticToken::new("tok123"),
            Arc::new(PendingTransport),
        )
        .unwrap()
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let stream = start();
        assert_eq!(stream.subscriber_count(), 0);

        let first = stream.subscribe_to_balance(|_| {});
        let second = stream.subscribe_to_balance(|_| {});
        assert_ne!(first.id(), second.id());
        assert_eq!(stream.subscriber_count(), 2);

        assert!(first.unsubscribe());
        assert!(!first.unsubscribe());
        assert_eq!(stream.subscriber_count(), 1);
    }

    #[test]
    fn test_dropping_subscription_keeps_it_registered() {
        let stream = start();
        drop(stream.subscribe_to_balance(|_| {}));
        assert_eq!(stream.subscriber_count(), 1);
    }

    #[test]
    fn test_initial_state_is_connecting() {
        let stream = start();
        assert_eq!(stream.connection_state(), ConnectionState::Connecting);
        assert!(stream.is_running());
    }

    #[test]
    fn test_shutdown_stops_worker() {
        let stream = start();
        let state = stream.watch_connection_state();

        stream.shutdown().unwrap();
        assert!(!stream.is_running());
        assert_eq!(*state.borrow(), ConnectionState::Stopped);
        assert_eq!(stream.connection_state(), ConnectionState::Stopped);

        // Second call is a no-op
        stream.shutdown().unwrap();
    }

    #[test]
    fn test_drop_stops_worker() {
        let stream = start();
        let state = stream.watch_connection_state();
        drop(stream);
        assert_eq!(*state.borrow(), ConnectionState::Stopped);
    }

    #[test]
    fn test_unsubscribe_after_stream_dropped() {
        let stream = start();
        let subscription = stream.subscribe_to_balance(|_| {});
        drop(stream);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StreamConfig::new("ws://127.0.0.1:9/ws")
            .unwrap()
            .with_connect_timeout(Duration::ZERO);
        let result =
            BalanceStream::start_with_transport(config, StaticToken::none(), Arc::new(PendingTransport));
        assert!(matches!(result, Err(StreamError::Configuration(_))));
    }
}
