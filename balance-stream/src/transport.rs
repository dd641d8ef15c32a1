//! Transport abstraction and the production WebSocket implementation
//!
//! The connection manager only sees [`Transport`] and [`Connection`]. The
//! shipped implementation, [`WebSocketTransport`], speaks WebSocket through
//! `tokio-tungstenite`; tests substitute scripted transports to drive the
//! reconnect loop under a paused clock.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::TransportError;

/// A payload received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

/// Factory for connections to the push endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a new connection to `endpoint`
    ///
    /// # Arguments
    /// * `endpoint` - The `ws://` or `wss://` URL to connect to
    ///
    /// # Returns
    /// * `Ok(connection)` - An established connection ready for the handshake
    /// * `Err(TransportError)` - If the connection could not be established
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Connection>, TransportError>;
}

/// One established connection
#[async_trait]
pub trait Connection: Send {
    /// Send a text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next data frame
    ///
    /// Returns `None` once the peer has closed the connection. Control
    /// frames are handled internally and never returned.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    /// Close the connection with a close frame
    async fn close(&mut self);
}

/// WebSocket transport backed by `tokio-tungstenite`
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Connection>, TransportError> {
        tracing::debug!("Connecting to {}", endpoint);

        let (stream, response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(
            "WebSocket established with {} (HTTP {})",
            endpoint,
            response.status()
        );

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Inbound::Text(text))),
                Ok(Message::Binary(data)) => return Some(Ok(Inbound::Binary(data))),
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) => tracing::debug!(
                            "Server closed connection: code={}, reason={}",
                            frame.code,
                            frame.reason
                        ),
                        None => tracing::debug!("Server closed connection"),
                    }
                    return None;
                }
                // tungstenite queues the pong reply itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Error while closing WebSocket: {}", e);
        }
    }
}
