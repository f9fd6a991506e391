// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Multi-threaded queue tests
//!
//! Producers and consumers on OS threads, checking that blocking operations
//! hand off correctly and that the log agrees with what was delivered.

use ipcq_core::storage::wal::{read_records, EntryType};
use ipcq_core::{DurableQueue, Message, QueueConfig, QueueError, QueueKind, QueueManager};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn tagged(producer: u32, seq: u32) -> Message {
    Message::new(format!("{producer}:{seq}").into_bytes())
}

#[test]
fn per_producer_order_is_preserved() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(
        DurableQueue::create("q", &dir.path().join("q.wal"), QueueConfig::bounded(4)).unwrap(),
    );
    let producers = 3u32;
    let per_producer = 40u32;

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..per_producer {
                    queue.put(tagged(p, seq)).unwrap();
                }
            })
        })
        .collect();

    let mut last_seen = vec![None::<u32>; producers as usize];
    for _ in 0..producers * per_producer {
        let msg = queue.take().unwrap();
        let text = String::from_utf8(msg.payload.to_vec()).unwrap();
        let (p, seq) = text.split_once(':').unwrap();
        let (p, seq): (usize, u32) = (p.parse().unwrap(), seq.parse().unwrap());
        assert!(last_seen[p].map_or(true, |prev| prev < seq));
        last_seen[p] = Some(seq);
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(queue.is_empty());
}

#[test]
fn log_records_every_handoff() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("q.wal");
    let queue = Arc::new(DurableQueue::create("q", &path, QueueConfig::bounded(2)).unwrap());

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for seq in 0..25 {
                queue.put(tagged(0, seq)).unwrap();
            }
        })
    };
    let mut delivered = HashSet::new();
    for _ in 0..25 {
        delivered.insert(queue.take().unwrap().id);
    }
    producer.join().unwrap();
    queue.close();

    let (records, _) = read_records(&path).unwrap();
    let acked: HashSet<_> = records
        .iter()
        .filter(|r| r.kind() == Ok(EntryType::Ack))
        .map(|r| r.correlation_id)
        .collect();
    let logged = records
        .iter()
        .filter(|r| r.kind() == Ok(EntryType::Data))
        .count();

    assert_eq!(logged, 25);
    assert_eq!(acked, delivered);
    let lsns: Vec<u64> = records.iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, (1..=51).collect::<Vec<u64>>());
}

#[test]
fn blocked_producer_is_interrupted() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(
        DurableQueue::create("q", &dir.path().join("q.wal"), QueueConfig::bounded(1)).unwrap(),
    );
    queue.put(Message::new("full")).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(Message::new("blocked")))
    };
    thread::sleep(Duration::from_millis(50));
    queue.interrupt();

    let err = producer.join().unwrap().unwrap_err();
    assert!(matches!(err, QueueError::Interrupted { .. }));
    assert_eq!(queue.len(), 1);
}

#[test]
fn close_releases_every_waiter() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(
        DurableQueue::create("q", &dir.path().join("q.wal"), QueueConfig::bounded(1)).unwrap(),
    );
    let waiters = 4;
    let ready = Arc::new(Barrier::new(waiters + 1));

    let handles: Vec<_> = (0..waiters)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let ready = Arc::clone(&ready);
            thread::spawn(move || {
                ready.wait();
                queue.poll_timeout(Duration::from_secs(30))
            })
        })
        .collect();
    ready.wait();
    thread::sleep(Duration::from_millis(50));
    queue.close();

    for handle in handles {
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, QueueError::Closed { .. }));
    }
}

#[test]
fn independent_queues_run_in_parallel() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(QueueManager::activate(dir.path(), false, false).unwrap());
    let names: Vec<String> = (0..4).map(|i| format!("lane/{i}")).collect();
    for name in &names {
        manager.create_queue(name, 8, QueueKind::Bounded).unwrap();
    }

    let handles: Vec<_> = names
        .iter()
        .cloned()
        .map(|name| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let queue = manager.get(&name).unwrap();
                for seq in 0..20 {
                    queue.put(tagged(0, seq)).unwrap();
                    queue.take().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for name in &names {
        assert!(manager.get(name).unwrap().is_empty());
        assert!(manager.load_wal_queue_messages(name).unwrap().is_empty());
    }
    manager.shutdown();
}
