//! The credential provider seam consumed by the balance stream.

use std::sync::Arc;

/// Source of the bearer credential sent in the stream handshake.
///
/// The provider is queried every time a connection opens, so implementations
/// should return whatever credential is current at that instant rather than
/// a value captured at construction time. Returning `None` means the caller
/// is unauthenticated; the handshake is still sent and the server decides
/// what to do with it.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` because the connection task runs on
/// a background worker thread.
pub trait CredentialProvider: Send + Sync {
    /// Get the current bearer token, if any.
    fn token(&self) -> Option<String>;
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for Arc<P> {
    fn token(&self) -> Option<String> {
        (**self).token()
    }
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for Box<P> {
    fn token(&self) -> Option<String> {
        (**self).token()
    }
}

/// A provider backed by a closure.
///
/// Created with [`from_fn`].
#[derive(Clone)]
pub struct FnProvider<F>(F);

/// Wrap a closure as a [`CredentialProvider`].
///
/// ```
/// use credential_store::{from_fn, CredentialProvider};
///
/// let provider = from_fn(|| Some("tok123".to_string()));
/// assert_eq!(provider.token().as_deref(), Some("tok123"));
/// ```
pub fn from_fn<F>(f: F) -> FnProvider<F>
where
    F: Fn() -> Option<String> + Send + Sync,
{
    FnProvider(f)
}

impl<F> CredentialProvider for FnProvider<F>
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        (self.0)()
    }
}

impl<F> std::fmt::Debug for FnProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProvider").finish_non_exhaustive()
    }
}

/// A provider that always hands back the same credential.
///
/// Handy for command-line tools that receive a token as an argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// Create a provider for the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Create a provider that never has a token.
    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}
