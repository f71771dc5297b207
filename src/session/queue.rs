//! Bounded per-session chunk queue
//!
//! A session's queue absorbs the difference between the producer's rate and
//! the client's drain rate. It never grows past its capacity: once full, the
//! overflow policy decides what gives.

use std::collections::VecDeque;

use crate::hub::{Chunk, OverflowPolicy};

/// Result of pushing a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Chunk appended, nothing lost
    Queued,
    /// Chunk appended after evicting the oldest one
    DroppedOldest,
    /// Queue full, incoming chunk discarded
    DroppedNewest,
    /// Queue full under the `Disconnect` policy; chunk not queued
    Overflow,
}

/// Bounded FIFO of chunks
#[derive(Debug)]
pub struct ChunkQueue {
    /// Maximum number of queued chunks
    capacity: usize,
    /// What to do when full
    policy: OverflowPolicy,
    /// Queued chunks, oldest first
    chunks: VecDeque<Chunk>,
    /// Queued payload in bytes
    size: usize,
}

impl ChunkQueue {
    /// Create a queue holding at most `capacity` chunks (minimum one)
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            policy,
            chunks: VecDeque::with_capacity(capacity),
            size: 0,
        }
    }

    /// Append a chunk, applying the overflow policy when full
    pub fn push(&mut self, chunk: Chunk) -> PushOutcome {
        if self.chunks.len() < self.capacity {
            self.push_back(chunk);
            return PushOutcome::Queued;
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                if let Some(old) = self.chunks.pop_front() {
                    self.size -= old.len();
                }
                self.push_back(chunk);
                PushOutcome::DroppedOldest
            }
            OverflowPolicy::DropNewest => PushOutcome::DroppedNewest,
            OverflowPolicy::Disconnect => PushOutcome::Overflow,
        }
    }

    /// Remove the oldest chunk
    pub fn pop(&mut self) -> Option<Chunk> {
        let chunk = self.chunks.pop_front()?;
        self.size -= chunk.len();
        Some(chunk)
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.size = 0;
    }

    /// Number of queued chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Queued payload in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    fn push_back(&mut self, chunk: Chunk) {
        self.size += chunk.len();
        self.chunks.push_back(chunk);
    }
}
