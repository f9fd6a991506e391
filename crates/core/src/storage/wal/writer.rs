// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL handle for durable append operations
//!
//! A [`Wal`] exclusively owns one log file. Opening it runs recovery: the
//! file is scanned from offset 0 and truncated at the end of the last valid
//! record. Appends are serialized by an internal lock and fsync'd before
//! returning.

use super::reader::RecordReader;
use super::record::{EntryType, WalRecord};
use super::WalError;
use crate::message::MessageId;
use bytes::Bytes;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Write-ahead log over a single file
pub struct Wal {
    path: PathBuf,
    inner: Mutex<WalInner>,
}

struct WalInner {
    /// `None` once the log has been closed
    file: Option<File>,
    last_lsn: u64,
    valid_end: u64,
}

/// What recovery found when the log was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryStats {
    pub records: u64,
    /// Bytes removed from the tail
    pub truncated_bytes: u64,
}

impl Wal {
    /// Open or create a log file and recover its valid prefix
    pub fn open(path: &Path) -> Result<Self, WalError> {
        Self::open_with_stats(path).map(|(wal, _)| wal)
    }

    /// Open a log file that must already exist
    ///
    /// A missing file is reported as `NotFound` and is not created.
    pub fn open_existing(path: &Path) -> Result<Self, WalError> {
        Self::open_file(path, false).map(|(wal, _)| wal)
    }

    /// Like [`Wal::open`], also reporting what recovery did
    pub fn open_with_stats(path: &Path) -> Result<(Self, RecoveryStats), WalError> {
        Self::open_file(path, true)
    }

    fn open_file(path: &Path, create: bool) -> Result<(Self, RecoveryStats), WalError> {
        let mut file = OpenOptions::new()
            .create(create)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        file.try_lock_exclusive().map_err(|_| WalError::Locked {
            path: path.to_path_buf(),
        })?;

        let (last_lsn, valid_end, stats) = Self::recover(&mut file, path)?;

        let wal = Self {
            path: path.to_path_buf(),
            inner: Mutex::new(WalInner {
                file: Some(file),
                last_lsn,
                valid_end,
            }),
        };
        Ok((wal, stats))
    }

    /// Scan from the start and cut the file at the first invalid record
    fn recover(file: &mut File, path: &Path) -> Result<(u64, u64, RecoveryStats), WalError> {
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;

        let mut reader = RecordReader::new(BufReader::new(&*file), file_len);
        let mut records = 0u64;
        for record in reader.by_ref() {
            record?;
            records += 1;
        }
        let last_lsn = reader.last_lsn();
        let valid_end = reader.valid_end();

        if let Some(stop) = reader.stop() {
            tracing::warn!(
                file = %path.display(),
                %stop,
                valid_end,
                "WAL corruption detected, truncating at last valid record"
            );
        }

        let mut stats = RecoveryStats {
            records,
            truncated_bytes: 0,
        };
        if valid_end < file_len {
            file.set_len(valid_end)?;
            file.sync_all()?;
            stats.truncated_bytes = file_len - valid_end;
            tracing::info!(
                file = %path.display(),
                position = valid_end,
                bytes = stats.truncated_bytes,
                "WAL truncated at corruption point"
            );
        }

        Ok((last_lsn, valid_end, stats))
    }

    fn lock(&self) -> MutexGuard<'_, WalInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record and return its LSN
    ///
    /// The record is durably persisted (fsync'd) before this returns. On any
    /// failure the LSN is not consumed and a partially written tail is cut
    /// back.
    pub fn append(
        &self,
        entry_type: EntryType,
        correlation_id: MessageId,
        payload: Bytes,
    ) -> Result<u64, WalError> {
        if payload.len() > i32::MAX as usize {
            return Err(WalError::PayloadTooLarge { len: payload.len() });
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        let file = inner.file.as_mut().ok_or_else(|| WalError::Closed {
            path: self.path.clone(),
        })?;

        let lsn = inner.last_lsn + 1;
        let encoded = WalRecord::new(lsn, entry_type, correlation_id, payload).encode();

        if let Err(e) = write_synced(file, inner.valid_end, &encoded) {
            if let Err(cut) = file.set_len(inner.valid_end) {
                tracing::error!(
                    file = %self.path.display(),
                    error = %cut,
                    "failed to cut back partial WAL write"
                );
            }
            return Err(e.into());
        }

        inner.last_lsn = lsn;
        inner.valid_end += encoded.len() as u64;
        Ok(lsn)
    }

    /// Read every record from the start up to the valid end
    pub fn read_all(&self) -> Result<Vec<WalRecord>, WalError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let file = inner.file.as_mut().ok_or_else(|| WalError::Closed {
            path: self.path.clone(),
        })?;

        file.seek(SeekFrom::Start(0))?;
        let limit = inner.valid_end;
        let mut reader = RecordReader::new(BufReader::new((&*file).take(limit)), limit);

        let mut records = Vec::new();
        for record in reader.by_ref() {
            records.push(record?);
        }

        // The valid region was verified at open and only grows by our own
        // appends, so any stop here means the file changed underneath us.
        if let Some(stop) = reader.stop() {
            return Err(WalError::Corrupted {
                path: self.path.clone(),
                lsn: reader.last_lsn() + 1,
                reason: stop.to_string(),
            });
        }
        Ok(records)
    }

    /// LSN of the last durable record, 0 for an empty log
    pub fn last_lsn(&self) -> u64 {
        self.lock().last_lsn
    }

    /// Byte offset just past the last durable record
    pub fn valid_end_position(&self) -> u64 {
        self.lock().valid_end
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.lock().file.is_none()
    }

    /// Release the file; further appends fail with [`WalError::Closed`]
    pub fn close(&self) {
        let mut inner = self.lock();
        if let Some(file) = inner.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::debug!(file = %self.path.display(), error = %e, "WAL unlock failed");
            }
        }
    }

    /// Close the log and delete its file
    pub fn delete(&self) -> Result<(), WalError> {
        self.close();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_synced(file: &mut File, offset: u64, bytes: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Wal")
            .field("path", &self.path)
            .field("last_lsn", &inner.last_lsn)
            .field("valid_end", &inner.valid_end)
            .field("closed", &inner.file.is_none())
            .finish()
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
