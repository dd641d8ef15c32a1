//! Error types for the balance-stream crate.
//!
//! Only lifecycle operations return [`StreamError`] to callers. Transport and
//! frame errors are recovered from inside the connection task and only show
//! up in logs.

/// Errors surfaced by the public stream API.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The background worker could not be started
    #[error("Failed to start stream worker: {0}")]
    WorkerStart(String),

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Errors raised by a transport while connecting or exchanging frames.
///
/// These never leave the connection task; they trigger a backoff retry.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The connection attempt exceeded the configured timeout
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// Sending a frame failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Receiving a frame failed
    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Errors from decoding an inbound frame or encoding the handshake.
///
/// Frames that fail to decode are dropped; a handshake that fails to encode
/// ends the session. These values exist for logging and tests.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload is not the `{subject, body}` JSON envelope
    #[error("Invalid frame JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A binary payload was not valid UTF-8
    #[error("Binary frame is not valid UTF-8")]
    InvalidUtf8,

    /// The payload exceeds the configured frame size limit
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Size of the rejected frame
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// A known subject arrived without a usable body field
    #[error("Subject '{subject}' is missing numeric field '{field}'")]
    MissingField {
        /// The frame subject
        subject: String,
        /// The field that was expected
        field: &'static str,
    },

    /// An outbound message could not be serialized
    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;
