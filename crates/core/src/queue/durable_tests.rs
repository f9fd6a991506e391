// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::message::MessageId;
use crate::storage::wal::{read_records, WalError};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn temp_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.wal");
    (dir, path)
}

fn bounded(path: &Path, capacity: u32) -> DurableQueue {
    DurableQueue::create("jobs", path, QueueConfig::bounded(capacity)).unwrap()
}

fn payloads(queue: &DurableQueue) -> Vec<Vec<u8>> {
    queue
        .messages()
        .unwrap()
        .iter()
        .map(|m| m.payload.to_vec())
        .collect()
}

fn record_kinds(path: &Path) -> Vec<EntryType> {
    let (records, _) = read_records(path).unwrap();
    records.iter().map(|r| r.kind().unwrap()).collect()
}

#[test]
fn create_writes_config_first() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 4);

    assert_eq!(queue.capacity(), Some(4));
    assert_eq!(queue.kind(), QueueKind::Bounded);
    assert_eq!(queue.last_lsn(), 1);
    assert_eq!(record_kinds(&path), vec![EntryType::Config]);
}

#[test]
fn create_rejects_bad_arguments() {
    let (_dir, path) = temp_path();

    let err = DurableQueue::create("jobs", &path, QueueConfig::bounded(0)).unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));

    let err = DurableQueue::create("", &path, QueueConfig::bounded(1)).unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));
}

#[test]
fn create_refuses_existing_log() {
    let (_dir, path) = temp_path();
    bounded(&path, 2).close();

    let err = DurableQueue::create("jobs", &path, QueueConfig::bounded(2)).unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));
}

#[test]
fn offer_and_poll_are_fifo() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 3);

    assert!(queue.offer(Message::new("a")).unwrap());
    assert!(queue.offer(Message::new("b")).unwrap());
    assert_eq!(queue.peek().unwrap().unwrap().payload, "a");

    assert_eq!(queue.poll().unwrap().unwrap().payload, "a");
    assert_eq!(queue.poll().unwrap().unwrap().payload, "b");
    assert!(queue.poll().unwrap().is_none());
    assert_eq!(
        record_kinds(&path),
        vec![
            EntryType::Config,
            EntryType::Data,
            EntryType::Data,
            EntryType::Ack,
            EntryType::Ack
        ]
    );
}

#[test]
fn offer_on_full_queue_returns_false_without_logging() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 1);

    assert!(queue.offer(Message::new("a")).unwrap());
    let lsn = queue.last_lsn();
    assert!(!queue.offer(Message::new("b")).unwrap());

    assert_eq!(queue.last_lsn(), lsn);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.remaining_capacity(), Some(0));
}

#[test]
fn transient_messages_are_not_logged() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 2);

    queue.offer(Message::new("temp").transient()).unwrap();
    assert_eq!(queue.poll().unwrap().unwrap().payload, "temp");

    assert_eq!(record_kinds(&path), vec![EntryType::Config]);
}

#[test]
fn timed_operations_time_out() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 1);

    assert!(queue.poll_timeout(Duration::from_millis(20)).unwrap().is_none());

    queue.put(Message::new("a")).unwrap();
    let started = Instant::now();
    let accepted = queue
        .offer_timeout(Message::new("b"), Duration::from_millis(50))
        .unwrap();

    assert!(!accepted);
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(queue.len(), 1);
}

#[test]
fn take_waits_for_put() {
    let (_dir, path) = temp_path();
    let queue = Arc::new(bounded(&path, 1));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.take().unwrap())
    };
    thread::sleep(Duration::from_millis(20));
    queue.put(Message::new("late")).unwrap();

    assert_eq!(consumer.join().unwrap().payload, "late");
    assert!(queue.is_empty());
}

#[test]
fn put_waits_for_space() {
    let (_dir, path) = temp_path();
    let queue = Arc::new(bounded(&path, 1));
    queue.put(Message::new("first")).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(Message::new("second")))
    };
    thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.take().unwrap().payload, "first");

    producer.join().unwrap().unwrap();
    assert_eq!(payloads(&queue), vec![b"second".to_vec()]);
}

#[test]
fn close_wakes_blocked_waiters() {
    let (_dir, path) = temp_path();
    let queue = Arc::new(bounded(&path, 1));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.take())
    };
    thread::sleep(Duration::from_millis(20));
    queue.close();

    let err = consumer.join().unwrap().unwrap_err();
    assert!(matches!(err, QueueError::Closed { .. }));
}

#[test]
fn operations_after_close_fail() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 2);
    queue.close();
    queue.close();

    assert!(queue.is_closed());
    assert!(matches!(
        queue.offer(Message::new("x")),
        Err(QueueError::Closed { .. })
    ));
    assert!(matches!(queue.poll(), Err(QueueError::Closed { .. })));
    assert!(matches!(queue.peek(), Err(QueueError::Closed { .. })));
    assert!(path.exists());
}

#[test]
fn interrupt_fails_current_waiters_only() {
    let (_dir, path) = temp_path();
    let queue = Arc::new(bounded(&path, 1));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.take())
    };
    thread::sleep(Duration::from_millis(20));
    queue.interrupt();

    let err = consumer.join().unwrap().unwrap_err();
    assert!(matches!(err, QueueError::Interrupted { .. }));

    queue.offer(Message::new("after")).unwrap();
    assert_eq!(queue.take().unwrap().payload, "after");
}

#[test]
fn remove_deletes_log_and_is_idempotent() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 2);
    queue.offer(Message::new("a")).unwrap();

    queue.remove().unwrap();
    queue.remove().unwrap();

    assert!(!path.exists());
    assert!(matches!(queue.poll(), Err(QueueError::Closed { .. })));
}

#[test]
fn failed_data_append_leaves_queue_unchanged() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 2);
    queue.wal.close();

    let err = queue.offer(Message::new("a")).unwrap_err();

    assert!(matches!(err, QueueError::Persistence(WalError::Closed { .. })));
    assert!(queue.is_empty());
}

#[test]
fn failed_ack_append_leaves_head_in_place() {
    let (_dir, path) = temp_path();
    let queue = bounded(&path, 2);
    queue.offer(Message::new("a")).unwrap();
    queue.wal.close();

    let err = queue.poll().unwrap_err();

    assert!(matches!(err, QueueError::Persistence(_)));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.peek().unwrap().unwrap().payload, "a");
}

#[test]
fn reconstruction_restores_live_messages_in_order() {
    let (_dir, path) = temp_path();
    {
        let queue = bounded(&path, 4);
        for body in ["a", "b", "c"] {
            queue.offer(Message::new(body)).unwrap();
        }
        queue.poll().unwrap();
        queue.close();
    }

    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();

    assert_eq!(queue.capacity(), Some(4));
    assert_eq!(payloads(&queue), vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn reconstruction_keeps_message_ids() {
    let (_dir, path) = temp_path();
    let id = MessageId::new();
    {
        let queue = bounded(&path, 2);
        queue.offer(Message::with_id(id, "a")).unwrap();
    }

    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert_eq!(queue.peek().unwrap().unwrap().id, id);
}

#[test]
fn reconstruction_drops_oldest_on_overflow() {
    let (_dir, path) = temp_path();
    {
        let wal = Wal::open(&path).unwrap();
        let config = LogEntry::Config(QueueConfig::bounded(2));
        wal.append(EntryType::Config, config.correlation_id(), config.encode_payload(false))
            .unwrap();
        for body in ["a", "b", "c"] {
            let msg = Message::new(body);
            wal.append(EntryType::Data, msg.id, LogEntry::Data(msg).encode_payload(false))
                .unwrap();
        }
    }

    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert_eq!(payloads(&queue), vec![b"b".to_vec(), b"c".to_vec()]);
    queue.close();

    // The dropped message stays dropped on the next restart
    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert_eq!(payloads(&queue), vec![b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn reconstruction_requires_config_first() {
    let (_dir, path) = temp_path();
    {
        let wal = Wal::open(&path).unwrap();
        let msg = Message::new("orphan");
        wal.append(EntryType::Data, msg.id, LogEntry::Data(msg).encode_payload(false))
            .unwrap();
    }

    let err = DurableQueue::create_from_wal("jobs", &path).unwrap_err();
    assert!(matches!(err, QueueError::Recovery { .. }));
}

#[test]
fn reconstruction_of_empty_log_fails() {
    let (_dir, path) = temp_path();
    std::fs::File::create(&path).unwrap();

    let err = DurableQueue::create_from_wal("jobs", &path).unwrap_err();
    assert!(matches!(err, QueueError::Recovery { .. }));
}

#[test]
fn reconstruction_of_missing_log_leaves_disk_untouched() {
    let (_dir, path) = temp_path();

    let err = DurableQueue::create_from_wal("jobs", &path).unwrap_err();

    assert!(matches!(err, QueueError::Recovery { .. }));
    assert!(!path.exists());
}

#[test]
fn create_reuses_log_left_empty_by_a_torn_config() {
    let (_dir, path) = temp_path();
    {
        let queue = bounded(&path, 2);
        queue.close();
    }
    let len = std::fs::metadata(&path).unwrap().len();
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 1)
        .unwrap();

    let queue = bounded(&path, 3);
    queue.offer(Message::new("a")).unwrap();

    assert_eq!(queue.capacity(), Some(3));
    assert_eq!(queue.last_lsn(), 2);
}

#[test]
fn reconstruction_reports_undecodable_entries() {
    let (_dir, path) = temp_path();
    {
        let wal = Wal::open(&path).unwrap();
        let config = LogEntry::Config(QueueConfig::bounded(2));
        wal.append(EntryType::Config, config.correlation_id(), config.encode_payload(false))
            .unwrap();
        // Too short to hold the expiry prefix of a message body
        wal.append(EntryType::Data, MessageId::new(), Bytes::from_static(b"abc"))
            .unwrap();
    }

    let err = DurableQueue::create_from_wal("jobs", &path).unwrap_err();
    assert!(matches!(err, QueueError::CorruptedLog { .. }));
}

#[test]
fn second_open_of_same_log_is_locked() {
    let (_dir, path) = temp_path();
    let _queue = bounded(&path, 2);

    let err = DurableQueue::create_from_wal("jobs", &path).unwrap_err();
    assert!(matches!(err, QueueError::Persistence(WalError::Locked { .. })));
}

#[test]
fn unbounded_queue_never_fills() {
    let (_dir, path) = temp_path();
    let queue = DurableQueue::create("jobs", &path, QueueConfig::unbounded()).unwrap();

    for i in 0..100u32 {
        assert!(queue.offer(Message::new(i.to_be_bytes().to_vec())).unwrap());
    }
    assert_eq!(queue.capacity(), None);
    assert_eq!(queue.remaining_capacity(), None);
    queue.close();

    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert_eq!(queue.kind(), QueueKind::Unbounded);
    assert_eq!(queue.len(), 100);
}

#[test]
fn decorated_buffer_persists_its_capacity() {
    let (_dir, path) = temp_path();
    let queue =
        DurableQueue::with_buffer("jobs", &path, Box::new(RingBuffer::new(3)), false).unwrap();
    queue.offer(Message::new("a")).unwrap();
    queue.close();

    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert_eq!(queue.capacity(), Some(3));
    assert_eq!(payloads(&queue), vec![b"a".to_vec()]);
}

#[test]
fn decorated_buffer_must_start_empty() {
    let (_dir, path) = temp_path();
    let mut deque = VecDeque::new();
    deque.push_back(Message::new("stale"));

    let err = DurableQueue::with_buffer("jobs", &path, Box::new(deque), false).unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));
}

#[test]
fn compressed_queue_round_trips_payloads() {
    let (_dir, path) = temp_path();
    let body = vec![b'z'; 4096];
    {
        let config = QueueConfig::bounded(2).with_compression(true);
        let queue = DurableQueue::create("jobs", &path, config).unwrap();
        queue.offer(Message::new(body.clone())).unwrap();
    }

    let (records, _) = read_records(&path).unwrap();
    assert!(records[1].payload.len() < body.len());

    let queue = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert!(queue.config().compressed);
    assert_eq!(queue.poll().unwrap().unwrap().payload, body);
}

#[test]
fn replay_can_discard_expired_messages() {
    let (_dir, path) = temp_path();
    {
        let queue = bounded(&path, 4);
        queue.offer(Message::new("stale").with_expiry(1)).unwrap();
        queue.offer(Message::new("fresh")).unwrap();
    }

    let kept = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert_eq!(kept.len(), 2);
    kept.close();

    let options = ReplayOptions {
        discard_expired: true,
    };
    let queue = DurableQueue::create_from_wal_with("jobs", &path, options).unwrap();
    assert_eq!(payloads(&queue), vec![b"fresh".to_vec()]);
}

#[test]
fn concurrent_producers_and_consumers_lose_nothing() {
    let (_dir, path) = temp_path();
    let queue = Arc::new(bounded(&path, 8));
    let per_producer = 50u32;

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..per_producer {
                    let tag = p * 1000 + i;
                    queue.put(Message::new(tag.to_be_bytes().to_vec())).unwrap();
                }
            })
        })
        .collect();
    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                (0..per_producer * 2)
                    .map(|_| queue.take().unwrap().payload.to_vec())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    let mut seen: Vec<Vec<u8>> = consumers
        .into_iter()
        .flat_map(|c| c.join().unwrap())
        .collect();
    seen.sort();
    seen.dedup();

    assert_eq!(seen.len(), (per_producer * 4) as usize);
    assert!(queue.is_empty());
    queue.close();

    let recovered = DurableQueue::create_from_wal("jobs", &path).unwrap();
    assert!(recovered.is_empty());
}
