//! Broadcast hub implementation
//!
//! The central collection of live sessions and the single entry point for
//! encoded audio.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::session::{ClientSession, EnqueueOutcome, SessionHandle};
use crate::stats::{HubCounters, HubStats, SessionStats};

use super::chunk::{Chunk, SessionId};
use super::config::HubConfig;
use super::error::HubError;

/// Central hub for all connected sessions
///
/// Thread-safe via a `RwLock` around the session map. Broadcasting only needs
/// the read lock; register/unregister take the write lock briefly. The lock is
/// never held across an await point, and nothing done under it performs I/O.
pub struct BroadcastHub {
    /// Map of session id to session
    sessions: RwLock<HashMap<SessionId, Arc<ClientSession>>>,

    /// Configuration
    config: HubConfig,

    next_session_id: AtomicU64,

    /// Set once by the shutdown sweep
    shutting_down: AtomicBool,

    counters: HubCounters,

    created_at: Instant,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("sessions", &self.session_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl BroadcastHub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            next_session_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
            counters: HubCounters::default(),
            created_at: Instant::now(),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new session
    ///
    /// The session starts Open with an empty queue. The returned handle reads
    /// the session's chunks and unregisters it when dropped.
    pub fn register(self: &Arc<Self>) -> Result<SessionHandle, HubError> {
        let mut sessions = self.write_sessions();

        // Checked under the write lock so a concurrent shutdown sweep
        // cannot miss a session registered during it
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }

        if self.config.max_sessions > 0 && sessions.len() >= self.config.max_sessions {
            tracing::warn!(
                max_sessions = self.config.max_sessions,
                "Session rejected: limit reached"
            );
            return Err(HubError::SessionLimitReached(self.config.max_sessions));
        }

        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(ClientSession::new(id, &self.config));
        sessions.insert(id, Arc::clone(&session));
        let active = sessions.len();
        drop(sessions);

        self.counters.total_sessions.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session_id = %id, sessions = active, "Session registered");

        Ok(SessionHandle::new(session, Arc::clone(self)))
    }

    /// Remove a session and close it
    ///
    /// Idempotent: unknown or already removed ids are ignored. Returns whether
    /// this call removed the session.
    pub fn unregister(&self, id: SessionId) -> bool {
        let removed = self.write_sessions().remove(&id);

        match removed {
            Some(session) => {
                session.close();
                tracing::debug!(
                    session_id = %id,
                    sessions = self.session_count(),
                    "Session unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Deliver a chunk to every registered session
    ///
    /// Each delivery is a bounded in-memory enqueue, so a stalled client never
    /// delays the caller or other sessions. Sessions found closed, or closed by
    /// the overflow policy, are removed before returning. Returns the number of
    /// sessions the chunk was queued for.
    pub fn broadcast(&self, chunk: Chunk) -> usize {
        self.counters.chunks_broadcast.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_broadcast
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);

        let mut delivered = 0;
        let mut dropped = 0;
        let mut reap = Vec::new();

        {
            let sessions = self.read_sessions();
            for (id, session) in sessions.iter() {
                match session.enqueue(chunk.clone()) {
                    EnqueueOutcome::Queued => delivered += 1,
                    EnqueueOutcome::DroppedOldest => {
                        delivered += 1;
                        dropped += 1;
                    }
                    EnqueueOutcome::DroppedNewest | EnqueueOutcome::Skipped => dropped += 1,
                    EnqueueOutcome::Overflowed => {
                        dropped += 1;
                        self.counters
                            .sessions_overflowed
                            .fetch_add(1, Ordering::Relaxed);
                        reap.push(*id);
                    }
                    EnqueueOutcome::Closed => reap.push(*id),
                }
            }
        }

        if dropped > 0 {
            self.counters
                .chunks_dropped
                .fetch_add(dropped, Ordering::Relaxed);
        }

        if !reap.is_empty() {
            let mut sessions = self.write_sessions();
            for id in reap {
                if let Some(session) = sessions.remove(&id) {
                    session.close();
                    tracing::debug!(session_id = %id, "Reaped closed session");
                }
            }
        }

        delivered
    }

    /// Close every session and refuse new registrations
    ///
    /// The sweep empties the map in one pass under the write lock. Drain tasks
    /// observe the close and end their responses. Safe to call more than once.
    /// Returns the number of sessions closed by this call.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Arc<ClientSession>> = {
            let mut sessions = self.write_sessions();
            self.shutting_down.store(true, Ordering::Release);
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in &drained {
            session.close();
        }

        if !drained.is_empty() {
            tracing::info!(sessions = drained.len(), "Hub shutdown: closed all sessions");
        }

        drained.len()
    }

    /// Whether the shutdown sweep has run
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Number of registered sessions
    pub fn session_count(&self) -> usize {
        self.read_sessions().len()
    }

    /// Check whether a session is registered
    pub fn contains(&self, id: SessionId) -> bool {
        self.read_sessions().contains_key(&id)
    }

    /// Get statistics for one session
    pub fn session_stats(&self, id: SessionId) -> Option<SessionStats> {
        self.read_sessions().get(&id).map(|s| s.stats())
    }

    /// Get hub-wide statistics
    pub fn stats(&self) -> HubStats {
        HubStats {
            active_sessions: self.session_count(),
            total_sessions: self.counters.total_sessions.load(Ordering::Relaxed),
            chunks_broadcast: self.counters.chunks_broadcast.load(Ordering::Relaxed),
            bytes_broadcast: self.counters.bytes_broadcast.load(Ordering::Relaxed),
            chunks_dropped: self.counters.chunks_dropped.load(Ordering::Relaxed),
            sessions_overflowed: self.counters.sessions_overflowed.load(Ordering::Relaxed),
            shutting_down: self.is_shutting_down(),
            uptime: self.created_at.elapsed(),
        }
    }

    // Map mutations are single insert/remove/drain calls, so a poisoned
    // lock still guards a consistent map
    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Arc<ClientSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Arc<ClientSession>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
