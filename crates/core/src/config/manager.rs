// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue manager configuration
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! wal_dir = "queues"
//! compress = true
//! compact_at_start = true
//! discard_expired = false
//! log_file = "ipcq.log"
//! ```
//!
//! Every key is optional. Relative paths resolve against the directory that
//! holds the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings for a [`QueueManager`](crate::manager::QueueManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding one `*.wal` file per queue
    pub wal_dir: PathBuf,
    /// Compress message payloads of newly created queues
    pub compress: bool,
    /// Compact each log in place before reconstructing its queue
    pub compact_at_start: bool,
    /// Drop expired messages during compaction and replay
    pub discard_expired: bool,
    /// Operational log destination; stderr when unset
    pub log_file: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("."),
            compress: false,
            compact_at_start: true,
            discard_expired: false,
            log_file: None,
        }
    }
}

impl ManagerConfig {
    pub fn new(wal_dir: impl Into<PathBuf>) -> Self {
        Self {
            wal_dir: wal_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_compact_at_start(mut self, compact: bool) -> Self {
        self.compact_at_start = compact;
        self
    }

    pub fn with_discard_expired(mut self, discard: bool) -> Self {
        self.discard_expired = discard;
        self
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.wal_dir = resolve(base, &config.wal_dir);
            config.log_file = config.log_file.map(|file| resolve(base, &file));
        }
        Ok(config)
    }

    /// Parse TOML text; paths are left as written
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
