// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable blocking queues
//!
//! A [`DurableQueue`] is a thread-safe FIFO whose mutations are written to
//! its WAL before they take effect in memory, so that the queue can be
//! rebuilt exactly from the log after a crash.

pub mod buffer;
pub mod durable;

pub use buffer::{Buffer, MessageBuffer, RingBuffer};
pub use durable::{DurableQueue, ReplayOptions};

use crate::storage::wal::{EntryError, WalError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid queue argument: {0}")]
    Validation(String),
    #[error("queue '{name}' is closed")]
    Closed { name: String },
    #[error("persistence failure: {0}")]
    Persistence(#[source] WalError),
    #[error("corrupted log {}: {reason}", path.display())]
    CorruptedLog { path: PathBuf, reason: String },
    #[error("cannot recover queue from {}: {reason}", path.display())]
    Recovery { path: PathBuf, reason: String },
    #[error("wait on queue '{name}' was interrupted")]
    Interrupted { name: String },
}

impl QueueError {
    pub(crate) fn corrupted(path: impl Into<PathBuf>, err: EntryError) -> Self {
        QueueError::CorruptedLog {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl From<WalError> for QueueError {
    fn from(err: WalError) -> Self {
        match err {
            WalError::Corrupted { path, lsn, reason } => QueueError::CorruptedLog {
                path,
                reason: format!("lsn {}: {}", lsn, reason),
            },
            other => QueueError::Persistence(other),
        }
    }
}
