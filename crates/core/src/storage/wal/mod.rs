// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-Ahead Log (WAL) module
//!
//! Durable, append-only binary log backing each queue. Queue state is
//! derived by replaying entries.
//!
//! ## Architecture
//!
//! ```text
//! LogEntry → (type, id, payload) → Wal::append → disk (<queue>.wal)
//!                                                   ↓
//!                         Wal::read_all → decode → compact → replay
//! ```
//!
//! ## Durability Guarantees
//!
//! - Every append is followed by `fsync()` before returning
//! - CRC-32 over each payload detects bit flips
//! - Torn writes (crash during append) are detected on open
//! - Recovery truncates the file at the last valid record

pub mod compactor;
pub mod entry;
pub mod reader;
pub mod record;
pub mod writer;

pub use compactor::{compact, compact_at};
pub use entry::{decode_entries, EntryError, LogEntry, QueueConfig, QueueKind};
pub use reader::{read_records, validate, RecordReader, ScanStop, WalValidation};
pub use record::{EntryType, WalRecord, HEADER_SIZE, MAGIC};
pub use writer::{RecoveryStats, Wal};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAL {} is already open elsewhere", path.display())]
    Locked { path: PathBuf },
    #[error("WAL {} is closed", path.display())]
    Closed { path: PathBuf },
    #[error("payload of {len} bytes exceeds the record limit")]
    PayloadTooLarge { len: usize },
    #[error("corrupted WAL {} at lsn {lsn}: {reason}", path.display())]
    Corrupted {
        path: PathBuf,
        lsn: u64,
        reason: String,
    },
}
