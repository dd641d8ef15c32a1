//! Error types for the credential-store crate.

use std::path::PathBuf;

/// Errors that can occur while reading or persisting credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Reading or writing the backing file failed
    #[error("Credential file {path} could not be accessed: {source}")]
    Io {
        /// The file being accessed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file did not contain a valid credential map
    #[error("Credential file {path} is not valid JSON: {source}")]
    Serialization {
        /// The file being decoded or encoded
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No per-user configuration directory exists on this platform
    #[error("No configuration directory available for the default credential file")]
    NoConfigDir,
}

/// Convenience type alias for Results using CredentialError.
pub type Result<T> = std::result::Result<T, CredentialError>;
