//! Broadcast hub for live fan-out
//!
//! The hub is the single point of truth for who is currently listening and the
//! only way encoded audio enters the distribution fabric. Each registered
//! session owns a bounded queue; the hub never touches a socket.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<BroadcastHub>
//!                     ┌─────────────────────────┐
//!                     │ sessions: HashMap<Id,   │
//!                     │   Arc<ClientSession> {  │
//!                     │     queue (bounded),    │
//!                     │     phase,              │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Encoder output]        [Drain task]            [Drain task]
//!    hub.broadcast()         next_chunk()            next_chunk()
//!         │                       │                       │
//!         └──► session.enqueue() ─┴──► write_all() ──► socket
//! ```
//!
//! # Zero-Copy Design
//!
//! A [`Chunk`] wraps `bytes::Bytes`, so every queue holds a reference-counted
//! view of the same allocation. `broadcast` is a loop of non-blocking enqueues;
//! all network I/O happens in the per-session drain tasks.

pub mod chunk;
pub mod config;
pub mod error;
pub mod store;

pub use chunk::{Chunk, SessionId};
pub use config::{HubConfig, OverflowPolicy};
pub use error::HubError;
pub use store::BroadcastHub;
