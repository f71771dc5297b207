//! Client session
//!
//! One session per connected listener. The producer pushes chunks in through
//! [`ClientSession::enqueue`]; the session's drain task pulls them out with
//! `next_chunk` and writes them to the network. Neither side ever waits on the
//! other except through the bounded queue.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::hub::{Chunk, HubConfig, SessionId};
use crate::media::find_frame_start;
use crate::stats::{SessionCounters, SessionStats};

use super::queue::{ChunkQueue, PushOutcome};
use super::state::{PhaseCell, SessionPhase};

/// Result of offering a chunk to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Chunk queued
    Queued,
    /// Chunk queued, oldest queued chunk evicted
    DroppedOldest,
    /// Queue full, chunk discarded
    DroppedNewest,
    /// Chunk discarded while waiting for the first frame header
    Skipped,
    /// Queue full under the disconnect policy; the session is now closing
    Overflowed,
    /// Session is not open; nothing happened
    Closed,
}

/// State guarded by the session mutex
#[derive(Debug)]
struct Pending {
    queue: ChunkQueue,
    /// Still looking for the first MPEG frame header
    awaiting_frame: bool,
}

/// Server-side representation of one streaming client
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    pending: Mutex<Pending>,
    phase: PhaseCell,
    /// Wakes the drain task when a chunk is queued
    data_ready: Notify,
    /// Cancelled on close; wakes the drain task even mid-write
    closed: CancellationToken,
    write_timeout: Duration,
    counters: SessionCounters,
    created_at: Instant,
}

impl ClientSession {
    pub(crate) fn new(id: SessionId, config: &HubConfig) -> Self {
        Self {
            id,
            pending: Mutex::new(Pending {
                queue: ChunkQueue::new(config.queue_capacity, config.overflow_policy),
                awaiting_frame: config.align_first_frame,
            }),
            phase: PhaseCell::new(),
            data_ready: Notify::new(),
            closed: CancellationToken::new(),
            write_timeout: config.write_timeout,
            counters: SessionCounters::default(),
            created_at: Instant::now(),
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase.load()
    }

    pub fn is_open(&self) -> bool {
        self.phase.load() == SessionPhase::Open
    }

    /// Longest a single network write may take
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Offer a chunk to this session
    ///
    /// Never blocks beyond the queue mutex, which is only held for O(1)
    /// queue operations.
    pub fn enqueue(&self, chunk: Chunk) -> EnqueueOutcome {
        if !self.is_open() {
            return EnqueueOutcome::Closed;
        }

        let outcome = {
            let mut pending = self.lock_pending();

            let chunk = if pending.awaiting_frame {
                match find_frame_start(chunk.as_ref()) {
                    Some(offset) => {
                        pending.awaiting_frame = false;
                        chunk.slice_from(offset)
                    }
                    None => {
                        drop(pending);
                        self.counters.record_dropped();
                        return EnqueueOutcome::Skipped;
                    }
                }
            } else {
                chunk
            };

            pending.queue.push(chunk)
        };

        match outcome {
            PushOutcome::Queued => {
                self.counters.record_enqueued();
                self.data_ready.notify_one();
                EnqueueOutcome::Queued
            }
            PushOutcome::DroppedOldest => {
                self.counters.record_enqueued();
                self.counters.record_dropped();
                self.data_ready.notify_one();
                tracing::trace!(session_id = %self.id, "Queue full, dropped oldest chunk");
                EnqueueOutcome::DroppedOldest
            }
            PushOutcome::DroppedNewest => {
                self.counters.record_dropped();
                tracing::trace!(session_id = %self.id, "Queue full, dropped incoming chunk");
                EnqueueOutcome::DroppedNewest
            }
            PushOutcome::Overflow => {
                self.counters.record_dropped();
                tracing::debug!(session_id = %self.id, "Queue overflow, closing session");
                self.close();
                EnqueueOutcome::Overflowed
            }
        }
    }

    /// Request the session to close
    ///
    /// Idempotent and safe from any context. Returns true only for the call
    /// that moved the session out of Open.
    pub fn close(&self) -> bool {
        let first = self.phase.begin_close();
        if first {
            tracing::debug!(session_id = %self.id, "Session closing");
        }
        self.closed.cancel();
        first
    }

    /// Resolves once [`close`](Self::close) has been called
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Wait for the next chunk to send
    ///
    /// Returns None as soon as the session leaves Open, without draining
    /// what is still queued.
    pub(crate) async fn next_chunk(&self) -> Option<Chunk> {
        loop {
            if !self.is_open() {
                return None;
            }

            if let Some(chunk) = self.lock_pending().queue.pop() {
                return Some(chunk);
            }

            // notify_one stores a permit, so a chunk queued between the pop
            // above and this await is not missed
            tokio::select! {
                _ = self.data_ready.notified() => {}
                _ = self.closed.cancelled() => return None,
            }
        }
    }

    /// Drain task exited; release queued chunks and enter the terminal state
    pub(crate) fn mark_closed(&self) {
        self.close();
        self.lock_pending().queue.clear();
        self.phase.finish_close();
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.counters.record_sent(bytes);
    }

    /// Number of chunks waiting to be sent
    pub fn queued(&self) -> usize {
        self.lock_pending().queue.len()
    }

    /// Snapshot of this session's counters
    pub fn stats(&self) -> SessionStats {
        use std::sync::atomic::Ordering::Relaxed;

        let (queued, queued_bytes) = {
            let pending = self.lock_pending();
            (pending.queue.len(), pending.queue.size())
        };

        SessionStats {
            id: self.id,
            chunks_enqueued: self.counters.chunks_enqueued.load(Relaxed),
            chunks_dropped: self.counters.chunks_dropped.load(Relaxed),
            chunks_sent: self.counters.chunks_sent.load(Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Relaxed),
            queued,
            queued_bytes,
            duration: self.created_at.elapsed(),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        // Queue operations cannot leave the state half-updated
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
