//! Wire format of the push channel.
//!
//! Every message in either direction is a JSON envelope of the form
//! `{"subject": <string>, "body": <object>}`. The client sends exactly one
//! outbound message, the handshake, and decodes everything it receives into
//! [`Frame`] before routing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FrameError;
use crate::types::Balance;

/// Subject of the outbound handshake message.
pub const HANDSHAKE_SUBJECT: &str = "handshake";

/// Inbound subjects this client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Authoritative balance replacement carried in `body.balance`
    Balance,
}

impl Subject {
    /// Look up a subject by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "balance" => Some(Subject::Balance),
            _ => None,
        }
    }

    /// The wire name of this subject.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Balance => "balance",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Frame {
    pub subject: String,
    #[serde(default)]
    pub body: Value,
}

impl Frame {
    /// Decode a text payload, rejecting anything over `max_bytes`.
    pub fn decode(raw: &str, max_bytes: usize) -> Result<Self, FrameError> {
        if raw.len() > max_bytes {
            return Err(FrameError::TooLarge {
                size: raw.len(),
                limit: max_bytes,
            });
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode a binary payload as UTF-8 JSON.
    pub fn decode_binary(raw: &[u8], max_bytes: usize) -> Result<Self, FrameError> {
        if raw.len() > max_bytes {
            return Err(FrameError::TooLarge {
                size: raw.len(),
                limit: max_bytes,
            });
        }
        let text = std::str::from_utf8(raw).map_err(|_| FrameError::InvalidUtf8)?;
        Self::decode(text, max_bytes)
    }

    /// The recognized subject, if any.
    pub fn known_subject(&self) -> Option<Subject> {
        Subject::from_wire(&self.subject)
    }

    /// Extract `body.balance` as a micro-unit amount.
    ///
    /// Integers must fit in `i64`. Floats are accepted only when they carry
    /// no fractional part and are within `i64` range.
    pub fn balance(&self) -> Result<Balance, FrameError> {
        let missing = || FrameError::MissingField {
            subject: self.subject.clone(),
            field: "balance",
        };

        let number = match self.body.get("balance") {
            Some(Value::Number(n)) => n,
            _ => return Err(missing()),
        };

        if let Some(micros) = number.as_i64() {
            return Ok(Balance::from_micros(micros));
        }

        match number.as_f64() {
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Ok(Balance::from_micros(f as i64))
            }
            _ => Err(missing()),
        }
    }
}

#[derive(Serialize)]
struct HandshakeBody<'a> {
    token: Option<&'a str>,
}

#[derive(Serialize)]
struct Handshake<'a> {
    subject: &'static str,
    body: HandshakeBody<'a>,
}

/// Encode the handshake carrying `token`, or `null` when absent.
///
/// An encoding failure is returned rather than replaced with an empty
/// payload; the caller treats it as a failed handshake.
pub fn encode_handshake(token: Option<&str>) -> Result<String, FrameError> {
    let message = Handshake {
        subject: HANDSHAKE_SUBJECT,
        body: HandshakeBody { token },
    };
    serde_json::to_string(&message).map_err(|e| FrameError::Encode(e.to_string()))
}
