//! Inbound frame dispatch.
//!
//! The router is the only place that knows which subjects exist. Decode
//! failures and unknown subjects are dropped here and never reach the
//! connection loop as errors.

use std::sync::Arc;

use crate::error::FrameError;
use crate::frame::{Frame, Subject};
use crate::registry::SubscriberRegistry;

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A balance was broadcast; `recipients` callbacks completed
    Delivered { recipients: usize },
    /// The frame could not be decoded or lacked a usable amount
    Malformed,
    /// The frame had a subject this client does not handle
    Ignored,
}

/// Decodes frames and dispatches recognized subjects.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<SubscriberRegistry>,
    max_frame_bytes: usize,
}

impl MessageRouter {
    pub fn new(registry: Arc<SubscriberRegistry>, max_frame_bytes: usize) -> Self {
        Self {
            registry,
            max_frame_bytes,
        }
    }

    /// Route a text payload.
    pub fn route(&self, raw: &str) -> RouteOutcome {
        self.dispatch(Frame::decode(raw, self.max_frame_bytes))
    }

    /// Route a binary payload, treated as UTF-8 JSON.
    pub fn route_binary(&self, raw: &[u8]) -> RouteOutcome {
        self.dispatch(Frame::decode_binary(raw, self.max_frame_bytes))
    }

    fn dispatch(&self, decoded: Result<Frame, FrameError>) -> RouteOutcome {
        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {}", e);
                return RouteOutcome::Malformed;
            }
        };

        match frame.known_subject() {
            Some(Subject::Balance) => match frame.balance() {
                Ok(balance) => {
                    tracing::debug!("Received balance update: {}", balance);
                    RouteOutcome::Delivered {
                        recipients: self.registry.broadcast(balance),
                    }
                }
                Err(e) => {
                    tracing::warn!("Dropping malformed frame: {}", e);
                    RouteOutcome::Malformed
                }
            },
            None => {
                tracing::trace!("Ignoring frame with unknown subject '{}'", frame.subject);
                RouteOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Balance;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::time::Duration;

    fn router_with_recorder() -> (MessageRouter, Arc<Mutex<Vec<Balance>>>) {
        let registry = Arc::new(SubscriberRegistry::new(Duration::from_millis(100)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(move |b| sink.lock().push(b));
        (MessageRouter::new(registry, 1024), seen)
    }

    #[test]
    fn test_balance_frame_is_delivered() {
        let (router, seen) = router_with_recorder();
        let outcome = router.route(r#"{"subject":"balance","body":{"balance":1500}}"#);

        assert_eq!(outcome, RouteOutcome::Delivered { recipients: 1 });
        assert_eq!(*seen.lock(), vec![Balance::from_micros(1500)]);
    }

    #[test]
    fn test_unknown_subject_is_ignored() {
        let (router, seen) = router_with_recorder();
        let outcome = router.route(r#"{"subject":"other","body":{"balance":1500}}"#);

        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(seen.lock().is_empty());
    }

    #[rstest]
    #[case::not_json("definitely not json")]
    #[case::missing_amount(r#"{"subject":"balance","body":{}}"#)]
    #[case::string_amount(r#"{"subject":"balance","body":{"balance":"12"}}"#)]
    #[case::fractional_amount(r#"{"subject":"balance","body":{"balance":0.5}}"#)]
    fn test_malformed_frames_are_dropped(#[case] raw: &str) {
        let (router, seen) = router_with_recorder();
        assert_eq!(router.route(raw), RouteOutcome::Malformed);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_malformed_frame_does_not_affect_next() {
        let (router, seen) = router_with_recorder();

        assert_eq!(router.route("{oops"), RouteOutcome::Malformed);
        assert_eq!(
            router.route(r#"{"subject":"balance","body":{"balance":7}}"#),
            RouteOutcome::Delivered { recipients: 1 }
        );
        assert_eq!(*seen.lock(), vec![Balance::from_micros(7)]);
    }

    #[test]
    fn test_oversized_frame_is_malformed() {
        let (router, seen) = router_with_recorder();
        let padding = "x".repeat(2048);
        let raw = format!(
            r#"{{"subject":"balance","body":{{"balance":1,"pad":"{}"}}}}"#,
            padding
        );

        assert_eq!(router.route(&raw), RouteOutcome::Malformed);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_binary_route() {
        let (router, seen) = router_with_recorder();
        let outcome = router.route_binary(br#"{"subject":"balance","body":{"balance":-3}}"#);

        assert_eq!(outcome, RouteOutcome::Delivered { recipients: 1 });
        assert_eq!(*seen.lock(), vec![Balance::from_micros(-3)]);
        assert_eq!(router.route_binary(&[0xc3, 0x28]), RouteOutcome::Malformed);
    }

    #[test]
    fn test_delivery_with_no_subscribers() {
        let registry = Arc::new(SubscriberRegistry::new(Duration::from_millis(100)));
        let router = MessageRouter::new(registry, 1024);
        assert_eq!(
            router.route(r#"{"subject":"balance","body":{"balance":1}}"#),
            RouteOutcome::Delivered { recipients: 0 }
        );
    }
}
