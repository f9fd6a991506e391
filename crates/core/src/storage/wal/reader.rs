// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential record scanning with corruption detection
//!
//! The reader decodes one record at a time from offset 0 and stops at the
//! first record that is torn or fails validation. Everything before that
//! point is the valid prefix of the log.

use super::record::{checksum, RecordHeader, WalRecord, HEADER_SIZE, MAGIC};
use super::WalError;
use bytes::Bytes;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Why a scan stopped before the end of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStop {
    /// Fewer than a header's worth of bytes remained
    TornHeader { offset: u64 },
    /// Header declared more payload than the file holds
    TornPayload { offset: u64, lsn: u64 },
    BadMagic { offset: u64, found: u32 },
    NegativeLength { offset: u64, len: i32 },
    ChecksumMismatch { offset: u64, lsn: u64 },
    LsnMismatch { offset: u64, expected: u64, found: u64 },
}

impl ScanStop {
    /// Byte offset of the first invalid record
    pub fn offset(&self) -> u64 {
        match self {
            ScanStop::TornHeader { offset }
            | ScanStop::TornPayload { offset, .. }
            | ScanStop::BadMagic { offset, .. }
            | ScanStop::NegativeLength { offset, .. }
            | ScanStop::ChecksumMismatch { offset, .. }
            | ScanStop::LsnMismatch { offset, .. } => *offset,
        }
    }
}

impl fmt::Display for ScanStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStop::TornHeader { offset } => write!(f, "incomplete header at offset {}", offset),
            ScanStop::TornPayload { offset, lsn } => {
                write!(f, "incomplete payload for lsn {} at offset {}", lsn, offset)
            }
            ScanStop::BadMagic { offset, found } => {
                write!(f, "bad magic {:#010x} at offset {}", found, offset)
            }
            ScanStop::NegativeLength { offset, len } => {
                write!(f, "negative payload length {} at offset {}", len, offset)
            }
            ScanStop::ChecksumMismatch { offset, lsn } => {
                write!(f, "checksum mismatch for lsn {} at offset {}", lsn, offset)
            }
            ScanStop::LsnMismatch {
                offset,
                expected,
                found,
            } => write!(
                f,
                "expected lsn {} but found {} at offset {}",
                expected, found, offset
            ),
        }
    }
}

/// Iterator over the valid prefix of a record stream
///
/// Yields records until the end of input or the first invalid record. Only
/// genuine I/O failures are yielded as errors; corruption ends iteration and
/// is reported by [`RecordReader::stop`].
pub struct RecordReader<R> {
    inner: R,
    /// Number of bytes the scan may consume
    limit: u64,
    position: u64,
    last_lsn: u64,
    stop: Option<ScanStop>,
    failed: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            position: 0,
            last_lsn: 0,
            stop: None,
            failed: false,
        }
    }

    /// Byte offset just past the last valid record
    pub fn valid_end(&self) -> u64 {
        self.position
    }

    /// LSN of the last valid record, 0 if none
    pub fn last_lsn(&self) -> u64 {
        self.last_lsn
    }

    /// Corruption that ended the scan, if any
    pub fn stop(&self) -> Option<&ScanStop> {
        self.stop.as_ref()
    }

    fn halt(&mut self, stop: ScanStop) -> io::Result<Option<WalRecord>> {
        self.stop = Some(stop);
        Ok(None)
    }

    fn read_record(&mut self) -> io::Result<Option<WalRecord>> {
        let offset = self.position;
        let remaining = self.limit.saturating_sub(offset);
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return self.halt(ScanStop::TornHeader { offset });
        }

        let mut raw = [0u8; HEADER_SIZE];
        match self.inner.read_exact(&mut raw) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.halt(ScanStop::TornHeader { offset });
            }
            Err(e) => return Err(e),
        }
        let header = RecordHeader::decode(&raw);

        if header.magic != MAGIC {
            return self.halt(ScanStop::BadMagic {
                offset,
                found: header.magic,
            });
        }
        if header.payload_len < 0 {
            return self.halt(ScanStop::NegativeLength {
                offset,
                len: header.payload_len,
            });
        }
        let expected = self.last_lsn + 1;
        if header.lsn != expected {
            return self.halt(ScanStop::LsnMismatch {
                offset,
                expected,
                found: header.lsn,
            });
        }

        let len = header.payload_len as u64;
        if len > remaining - HEADER_SIZE as u64 {
            return self.halt(ScanStop::TornPayload {
                offset,
                lsn: header.lsn,
            });
        }

        let mut payload = vec![0u8; len as usize];
        match self.inner.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.halt(ScanStop::TornPayload {
                    offset,
                    lsn: header.lsn,
                });
            }
            Err(e) => return Err(e),
        }

        if checksum(&payload) != header.checksum {
            return self.halt(ScanStop::ChecksumMismatch {
                offset,
                lsn: header.lsn,
            });
        }

        self.position = offset + HEADER_SIZE as u64 + len;
        self.last_lsn = header.lsn;

        Ok(Some(WalRecord {
            lsn: header.lsn,
            entry_type: header.entry_type,
            correlation_id: header.correlation_id,
            payload: Bytes::from(payload),
        }))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = io::Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.stop.is_some() {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Result of scanning a log without modifying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalValidation {
    pub valid_records: u64,
    pub last_lsn: u64,
    /// Byte offset just past the last valid record
    pub valid_end: u64,
    pub file_len: u64,
    pub corruption: Option<ScanStop>,
}

impl WalValidation {
    pub fn is_clean(&self) -> bool {
        self.corruption.is_none()
    }

    /// Bytes a recovery would discard
    pub fn trailing_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.valid_end)
    }
}

/// Read the valid prefix of a log file without locking or truncating it
pub fn read_records(path: &Path) -> Result<(Vec<WalRecord>, WalValidation), WalError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = RecordReader::new(BufReader::new(file), file_len);

    let mut records = Vec::new();
    for record in reader.by_ref() {
        records.push(record?);
    }

    let validation = WalValidation {
        valid_records: records.len() as u64,
        last_lsn: reader.last_lsn(),
        valid_end: reader.valid_end(),
        file_len,
        corruption: reader.stop().cloned(),
    };
    Ok((records, validation))
}

/// Validate a log file and report where its valid prefix ends
pub fn validate(path: &Path) -> Result<WalValidation, WalError> {
    read_records(path).map(|(_, validation)| validation)
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
