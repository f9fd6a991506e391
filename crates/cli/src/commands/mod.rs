// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod maintenance;
pub mod queue;

use crate::error::CliError;
use anyhow::{Context, Result};
use ipcq_core::storage::wal::validate;
use ipcq_core::{DurableQueue, ManagerConfig, ManagerError, QueueKind, QueueManager};
use std::path::PathBuf;
use std::sync::Arc;

/// Open the configured directory, creating it first if asked
fn open_manager(config: &ManagerConfig, create_dir: bool) -> Result<QueueManager> {
    if create_dir {
        std::fs::create_dir_all(&config.wal_dir)
            .with_context(|| format!("creating {}", config.wal_dir.display()))?;
    }
    match QueueManager::from_config(config) {
        Ok(manager) => Ok(manager),
        Err(ManagerError::DirectoryNotFound(dir)) => Err(CliError::directory_missing(&dir).into()),
        Err(e) => Err(e.into()),
    }
}

/// Log file of a queue that must already exist
fn existing_log(manager: &QueueManager, name: &str) -> Result<PathBuf> {
    let path = manager.path_for(name)?;
    if !path.exists() {
        return Err(CliError::queue_not_found(name).into());
    }
    Ok(path)
}

/// Load a queue that must already exist
fn open_existing(manager: &QueueManager, name: &str) -> Result<Arc<DurableQueue>> {
    let path = existing_log(manager, name)?;
    // A log with no records is an unfinished create, not a queue
    if validate(&path)?.valid_records == 0 {
        return Err(CliError::queue_not_found(name).into());
    }
    // Capacity and kind come from the log
    Ok(manager.get_or_create(name, 1, QueueKind::Bounded)?)
}
