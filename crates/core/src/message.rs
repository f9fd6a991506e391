// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages carried by durable queues
//!
//! A message has a stable 128-bit identifier, an opaque byte payload, a
//! durable flag chosen by the producer, and an optional expiry. Only durable
//! messages are written to the log.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Encoded body prefix: expiry in milliseconds since the Unix epoch (0 = never)
const BODY_PREFIX_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message body truncated: {len} bytes, need at least {BODY_PREFIX_LEN}")]
    Truncated { len: usize },
}

/// Unique identifier for a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Split into (high, low) 64-bit halves
    pub fn to_halves(self) -> (u64, u64) {
        let v = self.0.as_u128();
        ((v >> 64) as u64, v as u64)
    }

    pub fn from_halves(high: u64, low: u64) -> Self {
        Self(Uuid::from_u128(((high as u128) << 64) | low as u128))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message offered to or taken from a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Bytes,
    /// Whether the producer requires this message to survive a crash
    pub durable: bool,
    /// Milliseconds since the Unix epoch after which the message is stale
    pub expires_at_millis: Option<u64>,
}

impl Message {
    /// Create a durable message with a fresh id
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::with_id(MessageId::new(), payload)
    }

    pub fn with_id(id: MessageId, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
            durable: true,
            expires_at_millis: None,
        }
    }

    /// Mark the message as in-memory only
    pub fn transient(self) -> Self {
        Self {
            durable: false,
            ..self
        }
    }

    /// Expire the message `ttl` from now
    pub fn with_ttl(self, ttl: Duration) -> Self {
        let expires = now_millis().saturating_add(ttl.as_millis() as u64);
        self.with_expiry(expires)
    }

    /// Expire the message at `expires_at_millis`
    ///
    /// The body encodes "never" as 0, so the earliest representable expiry
    /// is 1 ms after the epoch. Both are already in the past.
    pub fn with_expiry(self, expires_at_millis: u64) -> Self {
        Self {
            expires_at_millis: Some(expires_at_millis.max(1)),
            ..self
        }
    }

    /// Check whether the message has expired as of `now_millis`
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires_at_millis.is_some_and(|at| at <= now_millis)
    }

    /// Serialize expiry and payload into a log body
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(BODY_PREFIX_LEN + self.payload.len());
        buf.put_u64(self.expires_at_millis.unwrap_or(0));
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Rebuild a durable message from a log body written by [`Message::to_bytes`]
    pub fn from_bytes(id: MessageId, mut body: Bytes) -> Result<Self, MessageError> {
        if body.len() < BODY_PREFIX_LEN {
            return Err(MessageError::Truncated { len: body.len() });
        }
        let expires = body.get_u64();
        Ok(Self {
            id,
            payload: body,
            durable: true,
            expires_at_millis: (expires != 0).then_some(expires),
        })
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
