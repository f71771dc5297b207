//! Session state machine
//!
//! ```text
//! Open ──(write error | disconnect | close)──► Closing ──(drain exits)──► Closed
//! ```
//!
//! Closed is terminal. The phase is shared between the producer, the drain
//! task and whoever holds the session handle, so it lives in an atomic.

use std::sync::atomic::{AtomicU8, Ordering};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepting chunks and draining them to the client
    Open,
    /// Close requested, drain task is exiting
    Closing,
    /// Drain task exited and released the writer
    Closed,
}

impl SessionPhase {
    fn to_u8(self) -> u8 {
        match self {
            SessionPhase::Open => 0,
            SessionPhase::Closing => 1,
            SessionPhase::Closed => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionPhase::Open,
            1 => SessionPhase::Closing,
            _ => SessionPhase::Closed,
        }
    }
}

/// Atomic holder for a [`SessionPhase`]
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionPhase::Open.to_u8()))
    }

    pub fn load(&self) -> SessionPhase {
        SessionPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Open -> Closing. Returns true only for the call that made the transition.
    pub fn begin_close(&self) -> bool {
        self.0
            .compare_exchange(
                SessionPhase::Open.to_u8(),
                SessionPhase::Closing.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Any phase -> Closed
    pub fn finish_close(&self) {
        self.0.store(SessionPhase::Closed.to_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let phase = PhaseCell::new();
        assert_eq!(phase.load(), SessionPhase::Open);

        assert!(phase.begin_close());
        assert_eq!(phase.load(), SessionPhase::Closing);

        phase.finish_close();
        assert_eq!(phase.load(), SessionPhase::Closed);
    }

    #[test]
    fn test_begin_close_once() {
        let phase = PhaseCell::new();

        assert!(phase.begin_close());
        assert!(!phase.begin_close());
    }

    #[test]
    fn test_closed_is_terminal() {
        let phase = PhaseCell::new();
        phase.finish_close();

        assert!(!phase.begin_close());
        assert_eq!(phase.load(), SessionPhase::Closed);
    }
}
