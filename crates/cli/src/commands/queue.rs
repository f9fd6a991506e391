// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue commands

use super::{open_existing, open_manager};
use crate::error::CliError;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use clap::Args;
use ipcq_core::{ManagerConfig, ManagerError, Message, QueueKind, QueueSummary};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Args)]
pub struct ShowArgs {
    /// Queue name
    pub queue: String,
}

#[derive(Args)]
pub struct PushArgs {
    /// Queue name
    pub queue: String,
    /// Message body
    pub payload: String,
    /// Capacity used when the queue is created
    #[arg(long, default_value_t = 64)]
    pub capacity: u32,
    /// Create the queue without a capacity bound
    #[arg(long)]
    pub unbounded: bool,
    /// Message lifetime, e.g. "30s" or "2h"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub ttl: Option<Duration>,
    /// Wait up to this long for space instead of failing when full
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Args)]
pub struct PopArgs {
    /// Queue name
    pub queue: String,
    /// Wait up to this long for a message
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Serialize)]
#[serde(transparent)]
struct QueueRow(QueueSummary);

impl fmt::Display for QueueRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = &self.0;
        match (&summary.config, &summary.error) {
            (Some(config), _) => {
                let capacity = config
                    .bound()
                    .map_or_else(|| "-".to_string(), |b| b.to_string());
                write!(
                    f,
                    "{:<24} {:<10} cap={:<6} live={:<6}{}",
                    summary.name,
                    config.kind,
                    capacity,
                    summary.live_messages,
                    if config.compressed { " lz4" } else { "" }
                )
            }
            (None, error) => write!(
                f,
                "{:<24} unreadable: {}",
                summary.name,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[derive(Serialize)]
struct MessageRow {
    id: String,
    bytes: usize,
    expires_at_millis: Option<u64>,
    payload: String,
}

impl From<&Message> for MessageRow {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.to_string(),
            bytes: msg.payload.len(),
            expires_at_millis: msg.expires_at_millis,
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
        }
    }
}

impl fmt::Display for MessageRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.payload.chars().take(60).collect();
        write!(f, "{}  {:>6}B  {}", self.id, self.bytes, preview)
    }
}

#[derive(Serialize)]
struct Pushed {
    queue: String,
    id: String,
    lsn: u64,
    len: usize,
}

impl fmt::Display for Pushed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pushed {} to '{}' (lsn {}, {} queued)",
            self.id, self.queue, self.lsn, self.len
        )
    }
}

/// A consumed message; text output is the bare payload
#[derive(Serialize)]
struct Popped(MessageRow);

impl fmt::Display for Popped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.payload)
    }
}

pub fn list(config: &ManagerConfig, format: OutputFormat) -> Result<()> {
    let manager = open_manager(config, false)?;
    let rows: Vec<QueueRow> = manager.inspect()?.into_iter().map(QueueRow).collect();
    output::print_list(&rows, format, "No queues");
    Ok(())
}

pub fn show(config: &ManagerConfig, args: ShowArgs, format: OutputFormat) -> Result<()> {
    let manager = open_manager(config, false)?;
    let messages = match manager.load_wal_queue_messages(&args.queue) {
        Err(ManagerError::QueueNotFound(name)) => {
            return Err(CliError::queue_not_found(&name).into())
        }
        other => other?,
    };

    let rows: Vec<MessageRow> = messages.iter().map(MessageRow::from).collect();
    output::print_list(&rows, format, &format!("Queue '{}' is empty.", args.queue));
    Ok(())
}

pub fn push(config: &ManagerConfig, args: PushArgs, format: OutputFormat) -> Result<()> {
    let manager = open_manager(config, true)?;
    let kind = if args.unbounded {
        QueueKind::Unbounded
    } else {
        QueueKind::Bounded
    };
    let queue = manager.get_or_create(&args.queue, args.capacity, kind)?;

    let mut msg = Message::new(args.payload.into_bytes());
    if let Some(ttl) = args.ttl {
        msg = msg.with_ttl(ttl);
    }
    let id = msg.id;
    let accepted = match args.timeout {
        Some(timeout) => queue.offer_timeout(msg, timeout)?,
        None => queue.offer(msg)?,
    };
    if !accepted {
        manager.shutdown();
        return Err(CliError::queue_full(&args.queue, queue.capacity().unwrap_or(0)).into());
    }

    let pushed = Pushed {
        queue: args.queue,
        id: id.to_string(),
        lsn: queue.last_lsn(),
        len: queue.len(),
    };
    manager.shutdown();
    output::print(&pushed, format);
    Ok(())
}

pub fn pop(config: &ManagerConfig, args: PopArgs, format: OutputFormat) -> Result<()> {
    let manager = open_manager(config, false)?;
    let queue = open_existing(&manager, &args.queue)?;

    let msg = match args.timeout {
        Some(timeout) => queue.poll_timeout(timeout)?,
        None => queue.poll()?,
    };
    manager.shutdown();

    match (msg, format) {
        (Some(msg), _) => output::print(&Popped(MessageRow::from(&msg)), format),
        (None, OutputFormat::Text) => println!("Queue '{}' is empty.", args.queue),
        (None, OutputFormat::Json) => println!("null"),
    }
    Ok(())
}
