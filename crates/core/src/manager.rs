// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory of queue logs
//!
//! A [`QueueManager`] owns a directory holding one `<name>.wal` file per
//! queue. At startup [`QueueManager::preload_queues`] compacts each log (if
//! configured) and rebuilds its queue. Queue names map to file names by
//! escaping `%` and `/`, so hierarchical names stay inside the directory and
//! the mapping can be reversed.

use crate::config::ManagerConfig;
use crate::logging::OperationalLog;
use crate::message::{now_millis, Message};
use crate::queue::durable::live_state;
use crate::queue::{DurableQueue, QueueError, ReplayOptions};
use crate::storage::wal::{
    compact_at, decode_entries, read_records, validate, EntryType, LogEntry, QueueConfig, QueueKind,
    Wal,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

const WAL_EXTENSION: &str = "wal";

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("queue directory {} does not exist", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("invalid queue name {name:?}: {reason}")]
    InvalidQueueName { name: String, reason: &'static str },
    #[error("queue '{0}' already exists")]
    QueueExists(String),
    #[error("queue '{0}' not found")]
    QueueNotFound(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load queue from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: QueueError,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result of compacting one log file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionResult {
    /// Number of entries removed
    pub entries_removed: usize,
    /// Number of entries kept
    pub entries_kept: usize,
    /// Bytes reclaimed from disk
    pub bytes_reclaimed: u64,
}

/// What a queue log holds, read without opening the queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    pub name: String,
    pub file: PathBuf,
    /// `None` when the log could not be read
    pub config: Option<QueueConfig>,
    pub live_messages: usize,
    pub error: Option<String>,
}

/// Owner of every queue in one directory
pub struct QueueManager {
    dir: PathBuf,
    compress: bool,
    compact_at_start: bool,
    discard_expired: bool,
    log: OperationalLog,
    queues: Mutex<BTreeMap<String, Arc<DurableQueue>>>,
}

impl QueueManager {
    /// Set up a manager over an existing directory
    pub fn activate(
        dir: impl Into<PathBuf>,
        compress: bool,
        compact_at_start: bool,
    ) -> Result<Self, ManagerError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ManagerError::DirectoryNotFound(dir));
        }
        Ok(Self {
            dir,
            compress,
            compact_at_start,
            discard_expired: false,
            log: OperationalLog::new("queue-manager"),
            queues: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn from_config(config: &ManagerConfig) -> Result<Self, ManagerError> {
        let mut manager =
            Self::activate(&config.wal_dir, config.compress, config.compact_at_start)?;
        manager.discard_expired = config.discard_expired;
        Ok(manager)
    }

    pub fn with_log(mut self, log: OperationalLog) -> Self {
        self.log = log;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<String, Arc<DurableQueue>>> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            discard_expired: self.discard_expired,
        }
    }

    /// Log file for a queue name
    pub fn path_for(&self, name: &str) -> Result<PathBuf, ManagerError> {
        Ok(self.dir.join(file_name_for(name)?))
    }

    /// `*.wal` files in the directory, sorted by file name
    pub fn wal_files(&self) -> Result<Vec<PathBuf>, ManagerError> {
        let io_err = |source| ManagerError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == WAL_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Rebuild every queue in the directory
    ///
    /// Queues already held by this manager are returned as they are. Logs
    /// with no valid record are left from a creation that never finished and
    /// are skipped. Stops at the first other log that cannot be loaded;
    /// queues loaded before it stay registered.
    pub fn preload_queues(&self) -> Result<Vec<Arc<DurableQueue>>, ManagerError> {
        let mut loaded = Vec::new();

        for path in self.wal_files()? {
            let Some(name) = queue_name_for(&path) else {
                self.log.warn(&path, "skipping file whose name does not decode to a queue name");
                continue;
            };
            if let Some(queue) = self.get(&name) {
                loaded.push(queue);
                continue;
            }
            if is_unfinished(&path) {
                self.log.warn(&path, "skipping log with no records; queue creation never finished");
                continue;
            }

            let queue = self.load(&name, &path)?;
            loaded.push(queue);
        }

        tracing::info!(dir = %self.dir.display(), queues = loaded.len(), "preloaded queues");
        Ok(loaded)
    }

    fn load(&self, name: &str, path: &Path) -> Result<Arc<DurableQueue>, ManagerError> {
        let fail = |source: QueueError| {
            self.log.error(path, "failed to load queue", Some(&source));
            ManagerError::Load {
                path: path.to_path_buf(),
                source,
            }
        };

        if self.compact_at_start {
            let result = compact_file(path, self.discard_expired).map_err(fail)?;
            if result.entries_removed > 0 {
                self.log.info(
                    path,
                    &format!(
                        "compacted: {} entries removed, {} kept, {} bytes reclaimed",
                        result.entries_removed, result.entries_kept, result.bytes_reclaimed
                    ),
                );
            }
        }

        let queue = DurableQueue::create_from_wal_with(name, path, self.replay_options())
            .map_err(fail)?;
        self.log.info(
            path,
            &format!("loaded queue '{}' with {} messages", name, queue.len()),
        );

        let queue = Arc::new(queue);
        self.registry().insert(name.to_string(), Arc::clone(&queue));
        Ok(queue)
    }

    /// Live messages of a queue, read without opening it
    ///
    /// Shows what the queue would hold if it were rebuilt now.
    pub fn load_wal_queue_messages(&self, name: &str) -> Result<Vec<Message>, ManagerError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ManagerError::QueueNotFound(name.to_string()));
        }
        let (records, _) = read_records(&path).map_err(QueueError::from)?;
        let (config, mut live) = live_state(&path, &records, self.replay_options())?;

        if let Some(bound) = config.bound() {
            let excess = live.len().saturating_sub(bound);
            live.drain(..excess);
        }
        Ok(live)
    }

    /// Summaries of every queue log in the directory
    pub fn inspect(&self) -> Result<Vec<QueueSummary>, ManagerError> {
        let mut summaries = Vec::new();
        for path in self.wal_files()? {
            let Some(name) = queue_name_for(&path) else {
                continue;
            };
            let state = read_records(&path)
                .map_err(QueueError::from)
                .and_then(|(records, _)| live_state(&path, &records, self.replay_options()));

            let summary = match state {
                Ok((config, live)) => QueueSummary {
                    name,
                    file: path,
                    config: Some(config),
                    live_messages: config.bound().map_or(live.len(), |b| live.len().min(b)),
                    error: None,
                },
                Err(e) => QueueSummary {
                    name,
                    file: path,
                    config: None,
                    live_messages: 0,
                    error: Some(e.to_string()),
                },
            };
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Create a new queue and its log
    ///
    /// `capacity` is ignored for unbounded queues.
    pub fn create_queue(
        &self,
        name: &str,
        capacity: u32,
        kind: QueueKind,
    ) -> Result<Arc<DurableQueue>, ManagerError> {
        let path = self.path_for(name)?;
        let mut queues = self.registry();
        if queues.contains_key(name) || (path.exists() && !is_unfinished(&path)) {
            return Err(ManagerError::QueueExists(name.to_string()));
        }

        let config = match kind {
            QueueKind::Bounded => QueueConfig::bounded(capacity),
            QueueKind::Unbounded => QueueConfig::unbounded(),
        }
        .with_compression(self.compress);
        let queue = Arc::new(DurableQueue::create(name, &path, config)?);
        queues.insert(name.to_string(), Arc::clone(&queue));

        self.log.info(&path, &format!("created queue '{}'", name));
        Ok(queue)
    }

    /// Return the named queue, loading or creating it as needed
    ///
    /// An existing log keeps its persisted capacity and kind.
    pub fn get_or_create(
        &self,
        name: &str,
        capacity: u32,
        kind: QueueKind,
    ) -> Result<Arc<DurableQueue>, ManagerError> {
        if let Some(queue) = self.get(name) {
            return Ok(queue);
        }
        let path = self.path_for(name)?;
        if path.exists() && !is_unfinished(&path) {
            return self.load(name, &path);
        }
        self.create_queue(name, capacity, kind)
    }

    pub fn get(&self, name: &str) -> Option<Arc<DurableQueue>> {
        self.registry().get(name).cloned()
    }

    /// Names of the queues this manager holds open
    pub fn queue_names(&self) -> Vec<String> {
        self.registry().keys().cloned().collect()
    }

    /// Close a queue and delete its log
    pub fn remove_queue(&self, name: &str) -> Result<(), ManagerError> {
        let path = self.path_for(name)?;
        let removed = self.registry().remove(name);

        match removed {
            Some(queue) => queue.remove()?,
            None if path.exists() => {
                let wal = Wal::open_existing(&path).map_err(QueueError::from)?;
                wal.delete().map_err(QueueError::from)?;
            }
            None => return Err(ManagerError::QueueNotFound(name.to_string())),
        }
        self.log.info(&path, &format!("removed queue '{}'", name));
        Ok(())
    }

    /// Close every queue; log files are kept
    pub fn shutdown(&self) {
        let queues = std::mem::take(&mut *self.registry());
        for queue in queues.values() {
            queue.close();
        }
        tracing::info!(dir = %self.dir.display(), closed = queues.len(), "queue manager shut down");
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("dir", &self.dir)
            .field("compress", &self.compress)
            .field("compact_at_start", &self.compact_at_start)
            .field("discard_expired", &self.discard_expired)
            .field("queues", &self.queue_names())
            .finish()
    }
}

/// Whether a log holds no valid record, as left by a crash before its
/// `Config` record was synced
fn is_unfinished(path: &Path) -> bool {
    validate(path).is_ok_and(|v| v.valid_records == 0)
}

/// File name for a queue name
pub fn file_name_for(name: &str) -> Result<String, ManagerError> {
    let invalid = |reason| ManagerError::InvalidQueueName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('\0') {
        return Err(invalid("name contains a NUL byte"));
    }

    let mut file = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            '%' => file.push_str("%25"),
            '/' => file.push_str("%2F"),
            c => file.push(c),
        }
    }
    file.push('.');
    file.push_str(WAL_EXTENSION);
    Ok(file)
}

/// Queue name for a log file, `None` if the name was not produced by
/// [`file_name_for`]
pub fn queue_name_for(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_str()?;
    let stem = file.strip_suffix(".wal")?;
    if stem.is_empty() {
        return None;
    }

    let mut name = String::with_capacity(stem.len());
    let mut rest = stem;
    while let Some(at) = rest.find('%') {
        name.push_str(&rest[..at]);
        let escape = rest.get(at..at + 3)?;
        match escape {
            "%25" => name.push('%'),
            "%2F" => name.push('/'),
            _ => return None,
        }
        rest = &rest[at + 3..];
    }
    name.push_str(rest);
    Some(name)
}

/// Rewrite a queue log without acknowledged (and optionally expired) data
///
/// The surviving entries are renumbered from lsn 1 into a temporary file
/// that then replaces the original. The log must not be open elsewhere.
pub fn compact_file(path: &Path, discard_expired: bool) -> Result<CompactionResult, QueueError> {
    let wal = Wal::open_existing(path)?;
    let records = wal.read_all()?;
    let old_size = wal.valid_end_position();

    let compressed = match records.first() {
        Some(first) if first.kind() == Ok(EntryType::Config) => {
            match LogEntry::from_record(first, false) {
                Ok(LogEntry::Config(config)) => config.compressed,
                Ok(_) => false,
                Err(e) => return Err(QueueError::corrupted(path, e)),
            }
        }
        // Not a queue log; reconstruction reports it
        _ => return Ok(CompactionResult::default()),
    };

    let entries = decode_entries(&records).map_err(|e| QueueError::corrupted(path, e))?;
    let kept = compact_at(entries, discard_expired.then(now_millis));
    if kept.len() == records.len() {
        return Ok(CompactionResult {
            entries_removed: 0,
            entries_kept: kept.len(),
            bytes_reclaimed: 0,
        });
    }

    let temp_path = path.with_extension("wal.compact.tmp");
    let written = write_compacted(&temp_path, &kept, compressed).map_err(|source| {
        let _ = std::fs::remove_file(&temp_path);
        QueueError::Persistence(source.into())
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| QueueError::Persistence(e.into()))?;
    wal.close();

    let result = CompactionResult {
        entries_removed: records.len() - kept.len(),
        entries_kept: kept.len(),
        bytes_reclaimed: old_size.saturating_sub(written),
    };
    tracing::info!(
        file = %path.display(),
        entries_removed = result.entries_removed,
        entries_kept = result.entries_kept,
        bytes_reclaimed = result.bytes_reclaimed,
        "WAL compacted"
    );
    Ok(result)
}

fn write_compacted(
    path: &Path,
    entries: &[LogEntry],
    compressed: bool,
) -> Result<u64, std::io::Error> {
    let mut file = std::fs::File::create(path)?;
    let mut written = 0u64;
    for (lsn, entry) in (1u64..).zip(entries) {
        let bytes = entry.to_record(lsn, compressed).encode();
        file.write_all(&bytes)?;
        written += bytes.len() as u64;
    }
    file.sync_all()?;
    Ok(written)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
