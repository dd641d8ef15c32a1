//! Balance subscriber registry with per-callback fault isolation
//!
//! This module holds the live balance subscriptions and fans each pushed
//! balance out to all of them. Callbacks run outside the registry lock on a
//! snapshot, so a callback may subscribe or unsubscribe without deadlocking,
//! and a panicking callback never stops delivery to the others.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{Balance, SubscriptionId};

/// Callback invoked with every pushed balance.
pub type BalanceCallback = Arc<dyn Fn(Balance) + Send + Sync>;

/// Thread-safe registry of balance subscribers
pub struct SubscriberRegistry {
    /// Mapping from subscription ID to callback
    subscribers: RwLock<HashMap<SubscriptionId, BalanceCallback>>,

    /// Atomic counter for generating unique subscription IDs
    next_id: AtomicU64,

    /// Callbacks running longer than this are reported
    slow_callback_threshold: Duration,
}

impl SubscriberRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    /// * `slow_callback_threshold` - Duration after which a single callback is logged as slow
    pub fn new(slow_callback_threshold: Duration) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            slow_callback_threshold,
        }
    }

    /// Register a callback and return its identifier
    ///
    /// Registering the same callback twice creates two independent
    /// subscriptions that are each invoked once per broadcast.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Balance) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().insert(id, Arc::new(callback));
        tracing::debug!("Registered balance subscriber {}", id);
        id
    }

    /// Remove a subscription
    ///
    /// # Returns
    /// `true` if the subscription was live, `false` if it was unknown or
    /// already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Removed balance subscriber {}", id);
        }
        removed
    }

    /// Deliver `balance` to every subscriber registered at call time
    ///
    /// # Returns
    /// The number of callbacks that returned without panicking.
    pub fn broadcast(&self, balance: Balance) -> usize {
        let snapshot: Vec<(SubscriptionId, BalanceCallback)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            let started = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| callback(balance)));
            let elapsed = started.elapsed();

            match result {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(
                        "Balance subscriber {} panicked: {}",
                        id,
                        panic_message(payload.as_ref())
                    );
                }
            }

            if elapsed > self.slow_callback_threshold {
                tracing::warn!(
                    "Balance subscriber {} took {:?} (threshold {:?})",
                    id,
                    elapsed,
                    self.slow_callback_threshold
                );
            }
        }

        tracing::trace!("Broadcast balance {} to {} subscribers", balance, delivered);
        delivered
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Remove every subscription
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .field("slow_callback_threshold", &self.slow_callback_threshold)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
