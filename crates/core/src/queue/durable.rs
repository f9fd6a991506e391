// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL-backed blocking queue
//!
//! Write-ahead discipline: a durable message's `Data` record is appended
//! before its slot is written, and a dequeue's `Ack` record is appended
//! before the head advances. If the append fails the in-memory state is left
//! untouched. Appends happen under the queue lock, so log order and FIFO
//! order are the same.

use super::buffer::{Buffer, MessageBuffer, RingBuffer};
use super::QueueError;
use crate::message::{now_millis, Message};
use crate::storage::wal::{
    compact_at, decode_entries, EntryType, LogEntry, QueueConfig, QueueKind, Wal, WalError,
    WalRecord,
};
use bytes::Bytes;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Options applied when rebuilding a queue from its log
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Skip messages whose expiry has passed
    pub discard_expired: bool,
}

/// A bounded (or unbounded) FIFO of messages mirrored into a WAL
pub struct DurableQueue {
    name: String,
    config: QueueConfig,
    wal: Wal,
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
}

struct QueueState {
    buffer: Buffer,
    closed: bool,
    removed: bool,
    /// Bumped by `interrupt`; waiters that observe a change give up
    interrupts: u64,
}

impl DurableQueue {
    /// Create a new queue whose log starts at `path`
    ///
    /// Writes the `Config` record as the first entry of the log. Fails if the
    /// file already holds records; use [`DurableQueue::create_from_wal`] for
    /// existing logs.
    pub fn create(
        name: impl Into<String>,
        path: &Path,
        config: QueueConfig,
    ) -> Result<Self, QueueError> {
        let name = validate_name(name.into())?;
        validate_config(&config)?;
        let buffer = buffer_for(&config);
        Self::initialize(name, path, config, buffer)
    }

    /// Create a queue that decorates `buffer` with log side effects
    ///
    /// The persisted kind and capacity follow `buffer.capacity()`. A queue
    /// rebuilt from this log later uses the built-in buffer for that kind.
    pub fn with_buffer(
        name: impl Into<String>,
        path: &Path,
        buffer: Box<dyn MessageBuffer>,
        compressed: bool,
    ) -> Result<Self, QueueError> {
        let name = validate_name(name.into())?;
        if !buffer.is_empty() {
            return Err(QueueError::Validation(
                "decorated buffer must start empty".to_string(),
            ));
        }
        let config = match buffer.capacity() {
            Some(capacity) => QueueConfig::bounded(u32::try_from(capacity).unwrap_or(u32::MAX)),
            None => QueueConfig::unbounded(),
        }
        .with_compression(compressed);
        validate_config(&config)?;
        Self::initialize(name, path, config, Buffer::Delegate(buffer))
    }

    fn initialize(
        name: String,
        path: &Path,
        config: QueueConfig,
        buffer: Buffer,
    ) -> Result<Self, QueueError> {
        let wal = Wal::open(path)?;
        if wal.last_lsn() > 0 {
            return Err(QueueError::Validation(format!(
                "{} already holds a queue log",
                path.display()
            )));
        }

        let entry = LogEntry::Config(config);
        wal.append(
            EntryType::Config,
            entry.correlation_id(),
            entry.encode_payload(false),
        )?;

        tracing::debug!(queue = %name, file = %path.display(), ?config, "created queue");
        Ok(Self::assemble(name, config, wal, buffer))
    }

    /// Rebuild a queue from an existing log
    pub fn create_from_wal(name: impl Into<String>, path: &Path) -> Result<Self, QueueError> {
        Self::create_from_wal_with(name, path, ReplayOptions::default())
    }

    /// Rebuild a queue from an existing log
    ///
    /// The log is recovered, decoded and compacted. Its first entry must be
    /// `Config`, from which capacity, kind and compression are taken. Live
    /// messages are replayed in order; if there are more than the capacity,
    /// the oldest are dropped and tombstoned in the log.
    pub fn create_from_wal_with(
        name: impl Into<String>,
        path: &Path,
        options: ReplayOptions,
    ) -> Result<Self, QueueError> {
        let name = validate_name(name.into())?;
        let wal = match Wal::open_existing(path) {
            Err(WalError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QueueError::Recovery {
                    path: path.to_path_buf(),
                    reason: "log file does not exist".to_string(),
                });
            }
            other => other?,
        };
        let records = wal.read_all()?;
        let (config, live) = live_state(path, &records, options)?;

        let queue = Self::assemble(name, config, wal, buffer_for(&config));
        queue.replay(live)?;

        tracing::info!(
            queue = %queue.name,
            file = %path.display(),
            records = records.len(),
            live = queue.len(),
            "recovered queue from WAL"
        );
        Ok(queue)
    }

    fn assemble(name: String, config: QueueConfig, wal: Wal, buffer: Buffer) -> Self {
        Self {
            name,
            config,
            wal,
            state: Mutex::new(QueueState {
                buffer,
                closed: false,
                removed: false,
                interrupts: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    fn replay(&self, mut live: Vec<Message>) -> Result<(), QueueError> {
        let mut state = self.lock();

        if let Some(bound) = self.config.bound() {
            if live.len() > bound {
                let excess = live.len() - bound;
                for dropped in live.drain(..excess) {
                    self.wal.append(EntryType::Ack, dropped.id, Bytes::new())?;
                }
                tracing::warn!(
                    queue = %self.name,
                    file = %self.wal.path().display(),
                    dropped = excess,
                    capacity = bound,
                    "log holds more live messages than capacity, dropped oldest"
                );
            }
        }

        for msg in live {
            state.buffer.push_back(msg).map_err(|_| self.no_room())?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_open(&self, state: &QueueState) -> Result<(), QueueError> {
        if state.closed {
            return Err(QueueError::Closed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn no_room(&self) -> QueueError {
        QueueError::Validation(format!("queue '{}' has no free slot", self.name))
    }

    /// Block on `cv` until `ready` holds, the deadline passes, the queue is
    /// closed, or the queue is interrupted.
    ///
    /// Returns `None` on timeout.
    fn wait_until<'a>(
        &'a self,
        mut state: MutexGuard<'a, QueueState>,
        cv: &Condvar,
        deadline: Option<Instant>,
        ready: impl Fn(&QueueState) -> bool,
    ) -> Result<Option<MutexGuard<'a, QueueState>>, QueueError> {
        let interrupts = state.interrupts;
        loop {
            self.ensure_open(&state)?;
            if state.interrupts != interrupts {
                return Err(QueueError::Interrupted {
                    name: self.name.clone(),
                });
            }
            if ready(&state) {
                return Ok(Some(state));
            }

            state = match deadline {
                None => cv.wait(state).unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    cv.wait_timeout(state, remaining)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
            };
        }
    }

    fn enqueue(&self, state: &mut QueueState, msg: Message) -> Result<(), QueueError> {
        if state.buffer.is_full() {
            return Err(self.no_room());
        }
        if msg.durable {
            let payload = LogEntry::Data(msg.clone()).encode_payload(self.config.compressed);
            let lsn = self.wal.append(EntryType::Data, msg.id, payload)?;
            tracing::trace!(queue = %self.name, lsn, id = %msg.id, "logged message");
        }
        state.buffer.push_back(msg).map_err(|_| self.no_room())?;
        self.not_empty.notify_one();
        Ok(())
    }

    fn dequeue(&self, state: &mut QueueState) -> Result<Option<Message>, QueueError> {
        let (id, durable) = match state.buffer.front() {
            Some(head) => (head.id, head.durable),
            None => return Ok(None),
        };
        if durable {
            let lsn = self.wal.append(EntryType::Ack, id, Bytes::new())?;
            tracing::trace!(queue = %self.name, lsn, %id, "logged ack");
        }
        let msg = state.buffer.pop_front();
        self.not_full.notify_one();
        Ok(msg)
    }

    fn offer_until(&self, msg: Message, deadline: Option<Instant>) -> Result<bool, QueueError> {
        let state = self.lock();
        let Some(mut state) =
            self.wait_until(state, &self.not_full, deadline, |s| !s.buffer.is_full())?
        else {
            return Ok(false);
        };
        self.enqueue(&mut state, msg)?;
        Ok(true)
    }

    fn poll_until(&self, deadline: Option<Instant>) -> Result<Option<Message>, QueueError> {
        let state = self.lock();
        let Some(mut state) =
            self.wait_until(state, &self.not_empty, deadline, |s| !s.buffer.is_empty())?
        else {
            return Ok(None);
        };
        self.dequeue(&mut state)
    }

    /// Enqueue without waiting; `false` if the queue is full
    pub fn offer(&self, msg: Message) -> Result<bool, QueueError> {
        let mut state = self.lock();
        self.ensure_open(&state)?;
        if state.buffer.is_full() {
            return Ok(false);
        }
        self.enqueue(&mut state, msg)?;
        Ok(true)
    }

    /// Enqueue, waiting up to `timeout` for space; `false` on timeout
    pub fn offer_timeout(&self, msg: Message, timeout: Duration) -> Result<bool, QueueError> {
        self.offer_until(msg, Instant::now().checked_add(timeout))
    }

    /// Enqueue, waiting as long as needed for space
    pub fn put(&self, msg: Message) -> Result<(), QueueError> {
        self.offer_until(msg, None).map(|_| ())
    }

    /// Dequeue without waiting; `None` if the queue is empty
    pub fn poll(&self) -> Result<Option<Message>, QueueError> {
        let mut state = self.lock();
        self.ensure_open(&state)?;
        self.dequeue(&mut state)
    }

    /// Dequeue, waiting up to `timeout` for a message; `None` on timeout
    pub fn poll_timeout(&self, timeout: Duration) -> Result<Option<Message>, QueueError> {
        self.poll_until(Instant::now().checked_add(timeout))
    }

    /// Dequeue, waiting as long as needed for a message
    pub fn take(&self) -> Result<Message, QueueError> {
        loop {
            if let Some(msg) = self.poll_until(None)? {
                return Ok(msg);
            }
        }
    }

    /// Head of the queue without removing it
    pub fn peek(&self) -> Result<Option<Message>, QueueError> {
        let state = self.lock();
        self.ensure_open(&state)?;
        Ok(state.buffer.front().cloned())
    }

    /// Messages from head to tail
    pub fn messages(&self) -> Result<Vec<Message>, QueueError> {
        let state = self.lock();
        self.ensure_open(&state)?;
        Ok(state.buffer.to_vec())
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots, `None` for unbounded queues
    pub fn remaining_capacity(&self) -> Option<usize> {
        let state = self.lock();
        state
            .buffer
            .capacity()
            .map(|cap| cap.saturating_sub(state.buffer.len()))
    }

    /// Wake every blocked waiter with [`QueueError::Interrupted`]
    ///
    /// Only waits in progress are affected.
    pub fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Stop all further I/O; the log file is kept. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.wal.close();
        self.not_full.notify_all();
        self.not_empty.notify_all();
        tracing::debug!(queue = %self.name, "queue closed");
    }

    /// Close the queue and delete its log file. Idempotent.
    pub fn remove(&self) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.removed {
            return Ok(());
        }
        state.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();

        self.wal.delete()?;
        state.removed = true;
        tracing::info!(queue = %self.name, file = %self.wal.path().display(), "queue removed");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    pub fn kind(&self) -> QueueKind {
        self.config.kind
    }

    /// Slot bound, `None` for unbounded queues
    pub fn capacity(&self) -> Option<usize> {
        self.config.bound()
    }

    pub fn path(&self) -> &Path {
        self.wal.path()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// LSN of the last record written to this queue's log
    pub fn last_lsn(&self) -> u64 {
        self.wal.last_lsn()
    }
}

impl std::fmt::Debug for DurableQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DurableQueue")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("buffer", &state.buffer)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Derive a queue's configuration and live messages from its records
///
/// Shared by reconstruction and by read-only inspection of a log.
pub(crate) fn live_state(
    path: &Path,
    records: &[WalRecord],
    options: ReplayOptions,
) -> Result<(QueueConfig, Vec<Message>), QueueError> {
    match records.first() {
        None => {
            return Err(QueueError::Recovery {
                path: path.to_path_buf(),
                reason: "log has no entries".to_string(),
            })
        }
        Some(first) if first.kind() != Ok(EntryType::Config) => {
            return Err(QueueError::Recovery {
                path: path.to_path_buf(),
                reason: format!(
                    "first entry (lsn {}) has type {}, expected CONFIG",
                    first.lsn, first.entry_type
                ),
            })
        }
        Some(_) => {}
    }

    let entries = decode_entries(records).map_err(|e| QueueError::corrupted(path, e))?;
    let mut entries = compact_at(entries, options.discard_expired.then(now_millis)).into_iter();

    let Some(LogEntry::Config(config)) = entries.next() else {
        return Err(QueueError::Recovery {
            path: path.to_path_buf(),
            reason: "leading CONFIG entry lost in compaction".to_string(),
        });
    };

    let live = entries
        .filter_map(|entry| match entry {
            LogEntry::Data(msg) => Some(msg),
            _ => None,
        })
        .collect();
    Ok((config, live))
}

fn buffer_for(config: &QueueConfig) -> Buffer {
    match config.kind {
        QueueKind::Bounded => Buffer::Ring(RingBuffer::new(config.capacity as usize)),
        QueueKind::Unbounded => Buffer::Delegate(Box::new(VecDeque::new())),
    }
}

fn validate_name(name: String) -> Result<String, QueueError> {
    if name.is_empty() {
        return Err(QueueError::Validation("queue name is empty".to_string()));
    }
    if name.contains('\0') {
        return Err(QueueError::Validation(format!(
            "queue name {:?} contains a NUL byte",
            name
        )));
    }
    Ok(name)
}

fn validate_config(config: &QueueConfig) -> Result<(), QueueError> {
    if config.kind == QueueKind::Bounded
        && (config.capacity == 0 || config.capacity > i32::MAX as u32)
    {
        return Err(QueueError::Validation(format!(
            "capacity must be between 1 and {}, got {}",
            i32::MAX,
            config.capacity
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "durable_tests.rs"]
mod tests;
