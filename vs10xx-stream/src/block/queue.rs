//! Bounded buffer queue.
//!
//! [`BufferQueue`] owns a fixed set of [`Buffer`]s allocated once at
//! construction. Each buffer is either in the free pool or on the pending
//! list; moving between the two shuffles an index, never the payload.
//!
//! The writer side is [`acquire`](BufferQueue::acquire) then
//! [`commit`](BufferQueue::commit): both act on the front of the free pool,
//! so a writer must fill and commit one buffer before acquiring the next.
//! The transmit side is [`head`](BufferQueue::head) then
//! [`retire`](BufferQueue::retire). The queue itself is not synchronized; the
//! device keeps it under the slot lock.

use std::collections::VecDeque;

use super::Buffer;

pub struct BufferQueue {
    storage: Box<[Buffer]>,
    free: VecDeque<usize>,
    pending: VecDeque<usize>,
}

impl BufferQueue {
    /// A queue of `capacity` empty buffers.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![Buffer::new(); capacity].into_boxed_slice(),
            free: (0..capacity).collect(),
            pending: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// No free buffer left.
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Nothing pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The buffer at the front of the free pool, to be filled in place.
    /// `None` when the queue is full.
    pub fn acquire(&mut self) -> Option<&mut Buffer> {
        let index = *self.free.front()?;
        Some(&mut self.storage[index])
    }

    /// Move the front free buffer to the pending list if it holds data.
    /// A commit of an empty buffer leaves the queue untouched.
    pub fn commit(&mut self) {
        let Some(&index) = self.free.front() else {
            return;
        };
        if self.storage[index].is_empty() {
            return;
        }
        self.free.pop_front();
        self.pending.push_back(index);
    }

    /// Oldest pending buffer.
    pub fn head(&self) -> Option<&Buffer> {
        self.pending.front().map(|&index| &self.storage[index])
    }

    /// Return the oldest pending buffer to the free pool.
    pub fn retire(&mut self) {
        if let Some(index) = self.pending.pop_front() {
            self.storage[index].clear();
            self.free.push_back(index);
        }
    }

    /// Return every pending buffer to the free pool, discarding its data.
    pub fn flush(&mut self) {
        while let Some(index) = self.pending.pop_front() {
            self.storage[index].clear();
            self.free.push_back(index);
        }
    }
}
