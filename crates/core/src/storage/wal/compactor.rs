// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log compaction
//!
//! Reduces an entry list to what is needed to rebuild live queue state: the
//! leading `Config`, then every `Data` entry not acknowledged later in the
//! list. `Ack` entries never survive. Relative order is preserved, and a
//! second pass over the output changes nothing.

use super::entry::LogEntry;
use crate::message::{now_millis, MessageId};
use std::collections::HashSet;

/// Compact `entries`, optionally dropping messages that have expired by now
pub fn compact(entries: Vec<LogEntry>, discard_expired: bool) -> Vec<LogEntry> {
    compact_at(entries, discard_expired.then(now_millis))
}

/// Compact `entries`, dropping messages expired at `expired_at` if given
pub fn compact_at(entries: Vec<LogEntry>, expired_at: Option<u64>) -> Vec<LogEntry> {
    let mut acked: HashSet<MessageId> = HashSet::new();
    let mut kept = Vec::with_capacity(entries.len());

    // Walk backwards so every Ack is known before the Data it tombstones
    for (index, entry) in entries.into_iter().enumerate().rev() {
        match entry {
            LogEntry::Ack(id) => {
                acked.insert(id);
            }
            LogEntry::Data(msg) => {
                let expired = expired_at.is_some_and(|now| msg.is_expired_at(now));
                if !acked.contains(&msg.id) && !expired {
                    kept.push(LogEntry::Data(msg));
                }
            }
            LogEntry::Config(config) => {
                if index == 0 {
                    kept.push(LogEntry::Config(config));
                }
            }
        }
    }

    kept.reverse();
    kept
}

#[cfg(test)]
#[path = "compactor_tests.rs"]
mod tests;
