// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors shown to the user with the facts behind them and what to try next

use std::fmt;
use std::path::Path;

/// A failure the CLI can explain
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    /// Facts about the state that led here
    pub details: Vec<String>,
    /// Commands or flags that may resolve it
    pub hints: Vec<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn directory_missing(dir: &Path) -> Self {
        CliError::new(format!("Queue directory {} does not exist", dir.display()))
            .detail("Nothing has been pushed to this directory yet")
            .hint("Push a message to create it: ipcq push <queue> <payload>")
            .hint("Point at another directory with --dir or --config")
    }

    pub fn queue_not_found(name: &str) -> Self {
        CliError::new(format!("Queue '{}' not found", name))
            .detail("The queue may never have been created or was removed")
            .hint("List known queues: ipcq list")
    }

    pub fn queue_full(name: &str, capacity: usize) -> Self {
        CliError::new(format!("Queue '{}' is full", name))
            .detail(format!("All {} slots hold unconsumed messages", capacity))
            .hint(format!("Consume a message: ipcq pop {}", name))
            .hint("Wait for space with --timeout <duration>")
    }

    /// The log of `name` has bytes past its last valid record
    pub fn wal_corruption(name: &str, valid_end: u64, reason: &str) -> Self {
        CliError::new(format!("Log of queue '{}' is damaged", name))
            .detail(format!("Valid records end at byte {}: {}", valid_end, reason))
            .detail("A crash during a write or a disk fault can leave a damaged tail")
            .hint(format!("Truncate the damaged tail: ipcq compact {}", name))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        for detail in &self.details {
            writeln!(f, "  {}", detail)?;
        }
        for hint in &self.hints {
            writeln!(f, "hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for CliError {}
