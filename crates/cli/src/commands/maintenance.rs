// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log maintenance commands

use super::{existing_log, open_manager};
use crate::error::CliError;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use ipcq_core::manager::queue_name_for;
use ipcq_core::storage::wal::validate;
use ipcq_core::{compact_file, CompactionResult, ManagerConfig};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Args)]
pub struct CompactArgs {
    /// Queue to compact; every queue when omitted
    pub queue: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Queue name
    pub queue: String,
}

#[derive(Serialize)]
struct Compacted {
    queue: String,
    #[serde(flatten)]
    result: CompactionResult,
}

impl fmt::Display for Compacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} removed={:<6} kept={:<6} reclaimed={}B",
            self.queue,
            self.result.entries_removed,
            self.result.entries_kept,
            self.result.bytes_reclaimed
        )
    }
}

#[derive(Serialize)]
struct VerifyReport {
    queue: String,
    file: PathBuf,
    valid_records: u64,
    last_lsn: u64,
    valid_end: u64,
    file_len: u64,
    damage: Option<String>,
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Queue: {}", self.queue)?;
        writeln!(f, "  File: {}", self.file.display())?;
        writeln!(f, "  Records: {} (last lsn {})", self.valid_records, self.last_lsn)?;
        write!(f, "  Valid bytes: {} of {}", self.valid_end, self.file_len)?;
        if let Some(damage) = &self.damage {
            write!(f, "\n  Damage: {}", damage)?;
        }
        Ok(())
    }
}

pub fn compact(config: &ManagerConfig, args: CompactArgs, format: OutputFormat) -> Result<()> {
    let manager = open_manager(config, false)?;
    let targets = match args.queue {
        Some(name) => {
            let path = existing_log(&manager, &name)?;
            vec![(name, path)]
        }
        None => manager
            .wal_files()?
            .into_iter()
            .filter_map(|path| queue_name_for(&path).map(|name| (name, path)))
            .collect(),
    };

    let mut rows = Vec::with_capacity(targets.len());
    for (queue, path) in targets {
        let result = compact_file(&path, config.discard_expired)
            .with_context(|| format!("compacting queue '{}'", queue))?;
        rows.push(Compacted { queue, result });
    }
    output::print_list(&rows, format, "No queues to compact.");
    Ok(())
}

pub fn verify(config: &ManagerConfig, args: VerifyArgs, format: OutputFormat) -> Result<()> {
    let manager = open_manager(config, false)?;
    let path = existing_log(&manager, &args.queue)?;
    let validation = validate(&path)?;

    let report = VerifyReport {
        queue: args.queue.clone(),
        file: path,
        valid_records: validation.valid_records,
        last_lsn: validation.last_lsn,
        valid_end: validation.valid_end,
        file_len: validation.file_len,
        damage: validation.corruption.as_ref().map(|stop| stop.to_string()),
    };
    output::print(&report, format);

    match &validation.corruption {
        Some(stop) => {
            Err(CliError::wal_corruption(&args.queue, validation.valid_end, &stop.to_string()).into())
        }
        None => Ok(()),
    }
}
