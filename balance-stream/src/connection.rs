//! Connection lifecycle: connect, handshake, receive, close and retry.
//!
//! [`ConnectionManager::run`] drives the loop
//! `Connecting -> Open -> Closed -> Connecting ...` until shutdown is
//! requested. Every suspension point (connect, next frame, retry delay) is
//! raced against the shutdown signal, so `Stopped` is reached promptly from
//! any state.

use std::sync::Arc;
use std::time::Duration;

use credential_store::CredentialProvider;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::backoff::BackoffPolicy;
use crate::config::StreamConfig;
use crate::error::TransportError;
use crate::frame::encode_handshake;
use crate::router::MessageRouter;
use crate::transport::{Connection, Inbound, Transport};
use crate::types::ConnectionState;

/// How an open session ended.
enum SessionEnd {
    Closed,
    Shutdown,
}

/// Owns the single push connection of one stream.
pub struct ConnectionManager {
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    router: MessageRouter,
    backoff: BackoffPolicy,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        router: MessageRouter,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        let backoff = BackoffPolicy::new(config.backoff.clone());
        Self {
            config,
            transport,
            credentials,
            router,
            backoff,
            state_tx,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Balance stream starting for {}", self.config.endpoint);

        loop {
            self.set_state(ConnectionState::Connecting);

            let attempt = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                result = self.establish() => result,
            };

            let open_for = match attempt {
                Ok(connection) => match self.session(connection, &mut shutdown).await {
                    (SessionEnd::Shutdown, _) => break,
                    (SessionEnd::Closed, open_for) => open_for,
                },
                Err(e) => {
                    tracing::warn!("Connection to {} failed: {}", self.config.endpoint, e);
                    Duration::ZERO
                }
            };

            self.backoff.record_connection(open_for);
            let delay = self.backoff.next_delay();
            self.set_state(ConnectionState::Closed { retry_in: delay });
            tracing::info!("Reconnecting in {:?}", delay);

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Stopped);
        tracing::info!("Balance stream stopped");
    }

    async fn establish(&self) -> Result<Box<dyn Connection>, TransportError> {
        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.transport.connect(&self.config.endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout(timeout)),
        }
    }

    /// Handshake, then route frames until the connection ends.
    ///
    /// Returns how the session ended and how long it was open.
    async fn session(
        &self,
        mut connection: Box<dyn Connection>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (SessionEnd, Duration) {
        // Read at send time so a token refreshed during an outage is used
        let token = self.credentials.token();
        tracing::debug!("Sending handshake (token present: {})", token.is_some());

        let sent = match encode_handshake(token.as_deref()) {
            Ok(handshake) => connection.send_text(handshake).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = sent {
            tracing::warn!("Handshake failed: {}", e);
            connection.close().await;
            return (SessionEnd::Closed, Duration::ZERO);
        }

        let opened_at = Instant::now();
        self.set_state(ConnectionState::Open);
        tracing::info!("Connected to {}", self.config.endpoint);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    connection.close().await;
                    return (SessionEnd::Shutdown, opened_at.elapsed());
                }
                inbound = connection.recv() => match inbound {
                    Some(Ok(Inbound::Text(text))) => {
                        self.router.route(&text);
                    }
                    Some(Ok(Inbound::Binary(data))) => {
                        self.router.route_binary(&data);
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Connection lost: {}", e);
                        return (SessionEnd::Closed, opened_at.elapsed());
                    }
                    None => {
                        tracing::info!("Connection closed by server");
                        return (SessionEnd::Closed, opened_at.elapsed());
                    }
                },
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!("Connection state: {} -> {}", previous, state);
        }
    }
}

/// Resolves once shutdown has been requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
