// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory message storage behind a durable queue
//!
//! A [`DurableQueue`](super::DurableQueue) keeps its messages either in an
//! embedded fixed-size ring ([`RingBuffer`]) or in any other
//! [`MessageBuffer`] it decorates with log side effects. [`Buffer`] is the
//! tagged choice between the two.

use crate::message::Message;
use std::collections::VecDeque;

/// FIFO storage a durable queue can mirror into its log
///
/// Implementations need no locking; the owning queue serializes access.
pub trait MessageBuffer: Send {
    /// Maximum number of messages, `None` if unbounded
    fn capacity(&self) -> Option<usize>;

    fn len(&self) -> usize;

    /// Append at the tail, handing the message back if there is no room
    fn push_back(&mut self, msg: Message) -> Result<(), Message>;

    fn front(&self) -> Option<&Message>;

    fn pop_front(&mut self) -> Option<Message>;

    /// Messages from head to tail
    fn to_vec(&self) -> Vec<Message>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.capacity().is_some_and(|cap| self.len() >= cap)
    }
}

/// Fixed-capacity circular buffer
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[Option<Message>]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl RingBuffer {
    /// Create a ring with `capacity` slots; `capacity` must be non-zero
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }
}

impl MessageBuffer for RingBuffer {
    fn capacity(&self) -> Option<usize> {
        Some(self.slots.len())
    }

    fn len(&self) -> usize {
        self.count
    }

    fn push_back(&mut self, msg: Message) -> Result<(), Message> {
        if self.count == self.slots.len() {
            return Err(msg);
        }
        self.slots[self.tail] = Some(msg);
        self.tail = self.advance(self.tail);
        self.count += 1;
        Ok(())
    }

    fn front(&self) -> Option<&Message> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    fn pop_front(&mut self) -> Option<Message> {
        if self.count == 0 {
            return None;
        }
        let msg = self.slots[self.head].take();
        self.head = self.advance(self.head);
        self.count -= 1;
        msg
    }

    fn to_vec(&self) -> Vec<Message> {
        (0..self.count)
            .filter_map(|i| self.slots[(self.head + i) % self.slots.len()].clone())
            .collect()
    }
}

impl MessageBuffer for VecDeque<Message> {
    fn capacity(&self) -> Option<usize> {
        None
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn push_back(&mut self, msg: Message) -> Result<(), Message> {
        VecDeque::push_back(self, msg);
        Ok(())
    }

    fn front(&self) -> Option<&Message> {
        VecDeque::front(self)
    }

    fn pop_front(&mut self) -> Option<Message> {
        VecDeque::pop_front(self)
    }

    fn to_vec(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }
}

/// Storage strategy of a durable queue
pub enum Buffer {
    /// Embedded fixed-size ring
    Ring(RingBuffer),
    /// Caller-supplied buffer decorated with log side effects
    Delegate(Box<dyn MessageBuffer>),
}

impl Buffer {
    fn inner(&self) -> &dyn MessageBuffer {
        match self {
            Buffer::Ring(ring) => ring,
            Buffer::Delegate(buffer) => buffer.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MessageBuffer {
        match self {
            Buffer::Ring(ring) => ring,
            Buffer::Delegate(buffer) => buffer.as_mut(),
        }
    }
}

impl MessageBuffer for Buffer {
    fn capacity(&self) -> Option<usize> {
        self.inner().capacity()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn push_back(&mut self, msg: Message) -> Result<(), Message> {
        self.inner_mut().push_back(msg)
    }

    fn front(&self) -> Option<&Message> {
        self.inner().front()
    }

    fn pop_front(&mut self) -> Option<Message> {
        self.inner_mut().pop_front()
    }

    fn to_vec(&self) -> Vec<Message> {
        self.inner().to_vec()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Buffer::Ring(_) => "Ring",
            Buffer::Delegate(_) => "Delegate",
        };
        f.debug_struct(variant)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
