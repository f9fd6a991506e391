// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk WAL record format
//!
//! ```text
//! offset  size  field
//!      0     4  magic          0x5157414C ("QWAL")
//!      4     8  lsn            1-based, no gaps
//!     12     4  entry type     1 CONFIG, 2 DATA, 3 ACK
//!     16    16  correlation id high half, low half
//!     32     4  payload length signed
//!     36     4  checksum       CRC-32 of payload bytes only
//!     40     n  payload
//! ```
//!
//! All integers are big-endian.

use crate::message::MessageId;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Sentinel at the start of every record
pub const MAGIC: u32 = 0x5157_414C;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 40;

/// Logical entry type tag stored in the record header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EntryType {
    Config = 1,
    Data = 2,
    Ack = 3,
}

impl EntryType {
    pub fn tag(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for EntryType {
    type Error = u32;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(EntryType::Config),
            2 => Ok(EntryType::Data),
            3 => Ok(EntryType::Ack),
            other => Err(other),
        }
    }
}

/// Decoded fixed-size record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: u32,
    pub lsn: u64,
    pub entry_type: u32,
    pub correlation_id: MessageId,
    pub payload_len: i32,
    pub checksum: u32,
}

impl RecordHeader {
    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &raw[..];
        let magic = buf.get_u32();
        let lsn = buf.get_u64();
        let entry_type = buf.get_u32();
        let high = buf.get_u64();
        let low = buf.get_u64();
        let payload_len = buf.get_i32();
        let checksum = buf.get_u32();
        Self {
            magic,
            lsn,
            entry_type,
            correlation_id: MessageId::from_halves(high, low),
            payload_len,
            checksum,
        }
    }
}

/// A complete record as stored in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub lsn: u64,
    /// Raw type tag; see [`EntryType`]
    pub entry_type: u32,
    pub correlation_id: MessageId,
    pub payload: Bytes,
}

impl WalRecord {
    pub fn new(lsn: u64, entry_type: EntryType, correlation_id: MessageId, payload: Bytes) -> Self {
        Self {
            lsn,
            entry_type: entry_type.tag(),
            correlation_id,
            payload,
        }
    }

    /// Typed entry type, or the raw tag if unknown
    pub fn kind(&self) -> Result<EntryType, u32> {
        EntryType::try_from(self.entry_type)
    }

    /// Size of this record on disk
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize header and payload.
    ///
    /// Callers must keep payloads under `i32::MAX` bytes; [`super::Wal::append`]
    /// enforces this.
    pub fn encode(&self) -> Bytes {
        let (high, low) = self.correlation_id.to_halves();
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32(MAGIC);
        buf.put_u64(self.lsn);
        buf.put_u32(self.entry_type);
        buf.put_u64(high);
        buf.put_u64(low);
        buf.put_i32(self.payload.len() as i32);
        buf.put_u32(checksum(&self.payload));
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// CRC-32 (IEEE) of a payload
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
