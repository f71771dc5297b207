//! Client sessions
//!
//! Each connected listener gets a [`ClientSession`]: a bounded queue filled by
//! the producer and a dedicated drain task that writes to the network. Slow
//! clients only ever hurt themselves; their queue overflows according to the
//! hub's [`OverflowPolicy`](crate::hub::OverflowPolicy) while everyone else
//! keeps receiving.

pub mod client;
pub mod handle;
pub mod queue;
pub mod state;

pub use client::{ClientSession, EnqueueOutcome};
pub use handle::{CloseGuard, DrainOutcome, SessionHandle, WriteFailure};
pub use queue::{ChunkQueue, PushOutcome};
pub use state::SessionPhase;
