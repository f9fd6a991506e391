// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ipcq-core: durable message queues backed by write-ahead logs
//!
//! This crate provides:
//! - A checksummed, append-only WAL with crash recovery by truncation
//! - The log entry vocabulary (config, data, ack) and its compactor
//! - Bounded and unbounded blocking queues that log before they mutate
//! - A manager that rebuilds every queue in a directory at startup

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod logging;
pub mod manager;
pub mod message;
pub mod queue;
pub mod storage;

pub use config::{ConfigError, ManagerConfig};
pub use logging::OperationalLog;
pub use manager::{compact_file, CompactionResult, ManagerError, QueueManager, QueueSummary};
pub use message::{Message, MessageId};
pub use queue::{DurableQueue, QueueError, ReplayOptions};
pub use storage::wal::{QueueConfig, QueueKind, Wal, WalError};
