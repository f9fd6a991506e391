// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical log entries
//!
//! Each entry maps to a WAL record's `(type, correlation id, payload)`:
//!
//! - `Config`: capacity (i32) + kind (u8) + compression flag (u8), nil id
//! - `Data`: message body, optionally LZ4-compressed, id = message id
//! - `Ack`: empty payload, id = consumed message id

use super::record::{EntryType, WalRecord};
use crate::message::{Message, MessageId};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_PAYLOAD_LEN: usize = 6;

/// Errors decoding a record into a [`LogEntry`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("unknown entry type {tag} at lsn {lsn}")]
    UnknownType { lsn: u64, tag: u32 },
    #[error("malformed {kind:?} entry at lsn {lsn}: {reason}")]
    Malformed {
        lsn: u64,
        kind: EntryType,
        reason: String,
    },
}

/// Whether a queue enforces a capacity bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    #[default]
    Bounded,
    Unbounded,
}

impl QueueKind {
    fn tag(self) -> u8 {
        match self {
            QueueKind::Bounded => 0,
            QueueKind::Unbounded => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(QueueKind::Bounded),
            1 => Some(QueueKind::Unbounded),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueKind::Bounded => write!(f, "bounded"),
            QueueKind::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Queue settings persisted as the first record of every queue log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Slot count for bounded queues; ignored for unbounded ones
    pub capacity: u32,
    pub kind: QueueKind,
    /// DATA payloads are LZ4-compressed
    pub compressed: bool,
}

impl QueueConfig {
    pub fn bounded(capacity: u32) -> Self {
        Self {
            capacity,
            kind: QueueKind::Bounded,
            compressed: false,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            capacity: 0,
            kind: QueueKind::Unbounded,
            compressed: false,
        }
    }

    pub fn with_compression(self, compressed: bool) -> Self {
        Self { compressed, ..self }
    }

    /// Slot bound, `None` for unbounded queues
    pub fn bound(&self) -> Option<usize> {
        match self.kind {
            QueueKind::Bounded => Some(self.capacity as usize),
            QueueKind::Unbounded => None,
        }
    }

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CONFIG_PAYLOAD_LEN);
        buf.put_i32(self.capacity.min(i32::MAX as u32) as i32);
        buf.put_u8(self.kind.tag());
        buf.put_u8(u8::from(self.compressed));
        buf.freeze()
    }

    fn decode(lsn: u64, mut payload: Bytes) -> Result<Self, EntryError> {
        let malformed = |reason: String| EntryError::Malformed {
            lsn,
            kind: EntryType::Config,
            reason,
        };
        if payload.len() != CONFIG_PAYLOAD_LEN {
            return Err(malformed(format!(
                "expected {} payload bytes, got {}",
                CONFIG_PAYLOAD_LEN,
                payload.len()
            )));
        }
        let capacity = payload.get_i32();
        let kind_tag = payload.get_u8();
        let compressed = payload.get_u8();

        let kind = QueueKind::from_tag(kind_tag)
            .ok_or_else(|| malformed(format!("unknown queue kind {}", kind_tag)))?;
        if capacity < 0 || (kind == QueueKind::Bounded && capacity == 0) {
            return Err(malformed(format!("invalid capacity {}", capacity)));
        }
        if compressed > 1 {
            return Err(malformed(format!("invalid compression flag {}", compressed)));
        }

        Ok(Self {
            capacity: capacity as u32,
            kind,
            compressed: compressed == 1,
        })
    }
}

/// A typed entry in a queue's log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Config(QueueConfig),
    Data(Message),
    Ack(MessageId),
}

impl LogEntry {
    pub fn entry_type(&self) -> EntryType {
        match self {
            LogEntry::Config(_) => EntryType::Config,
            LogEntry::Data(_) => EntryType::Data,
            LogEntry::Ack(_) => EntryType::Ack,
        }
    }

    pub fn correlation_id(&self) -> MessageId {
        match self {
            LogEntry::Config(_) => MessageId::nil(),
            LogEntry::Data(msg) => msg.id,
            LogEntry::Ack(id) => *id,
        }
    }

    /// Serialize the record payload for this entry
    pub fn encode_payload(&self, compressed: bool) -> Bytes {
        match self {
            LogEntry::Config(config) => config.encode(),
            LogEntry::Data(msg) => {
                let body = msg.to_bytes();
                if compressed {
                    Bytes::from(lz4_flex::compress_prepend_size(&body))
                } else {
                    body
                }
            }
            LogEntry::Ack(_) => Bytes::new(),
        }
    }

    /// Build the record this entry is stored as
    pub fn to_record(&self, lsn: u64, compressed: bool) -> WalRecord {
        WalRecord::new(
            lsn,
            self.entry_type(),
            self.correlation_id(),
            self.encode_payload(compressed),
        )
    }

    /// Decode a record; `compressed` comes from the log's `Config` entry
    pub fn from_record(record: &WalRecord, compressed: bool) -> Result<Self, EntryError> {
        let kind = record.kind().map_err(|tag| EntryError::UnknownType {
            lsn: record.lsn,
            tag,
        })?;
        let malformed = |reason: String| EntryError::Malformed {
            lsn: record.lsn,
            kind,
            reason,
        };

        match kind {
            EntryType::Config => QueueConfig::decode(record.lsn, record.payload.clone())
                .map(LogEntry::Config),
            EntryType::Data => {
                let body = if compressed {
                    lz4_flex::decompress_size_prepended(&record.payload)
                        .map(Bytes::from)
                        .map_err(|e| malformed(format!("decompression failed: {}", e)))?
                } else {
                    record.payload.clone()
                };
                Message::from_bytes(record.correlation_id, body)
                    .map(LogEntry::Data)
                    .map_err(|e| malformed(e.to_string()))
            }
            EntryType::Ack => Ok(LogEntry::Ack(record.correlation_id)),
        }
    }
}

/// Decode a log's records in order
///
/// Compression is taken from a leading `Config` record; a log without one is
/// decoded as uncompressed so the caller can still report what it found.
pub fn decode_entries(records: &[WalRecord]) -> Result<Vec<LogEntry>, EntryError> {
    let mut compressed = false;
    let mut entries = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let entry = LogEntry::from_record(record, compressed)?;
        if let (0, LogEntry::Config(config)) = (i, &entry) {
            compressed = config.compressed;
        }
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
