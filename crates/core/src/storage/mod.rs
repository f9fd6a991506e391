// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage module for log-based queue persistence

pub mod wal;

pub use wal::{LogEntry, QueueConfig, QueueKind, Wal, WalError};
