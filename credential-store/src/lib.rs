//! # credential-store
//!
//! Bearer credential storage for balance-sdk.
//!
//! This crate provides the [`CredentialProvider`] seam that the balance stream
//! queries at handshake time, plus a small two-layer key-value store
//! ([`TokenStore`]) that keeps the tokens returned by the identity service in
//! memory and, optionally, in a JSON file on disk.
//!
//! ```
//! use std::sync::Arc;
//! use credential_store::{CredentialProvider, TokenSet, TokenStore};
//!
//! let store = Arc::new(TokenStore::in_memory());
//! store.set_tokens(&TokenSet {
//!     token: Some("tok123".to_string()),
//!     ..Default::default()
//! }).unwrap();
//!
//! // Any clone of the Arc can be handed to the stream as its provider
//! let provider: Arc<dyn CredentialProvider> = store.clone();
//! assert_eq!(provider.token().as_deref(), Some("tok123"));
//! ```

mod error;
mod provider;
mod store;

pub use error::{CredentialError, Result};
pub use provider::{from_fn, CredentialProvider, FnProvider, StaticToken};
pub use store::{TokenSet, TokenStore, EXPIRES_KEY, REFRESH_KEY, TOKEN_KEY};
