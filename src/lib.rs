//! Live audio fan-out over HTTP
//!
//! One capture source is encoded once and the encoded stream is delivered to
//! any number of HTTP listeners. Each listener has its own bounded queue and
//! drain task, so a slow connection only ever loses its own audio.
//!
//! ```text
//! capture ──► encoder ──► BroadcastHub ──► ClientSession ──► GET /stream
//!                              │
//!                              ├─────────► ClientSession ──► GET /stream
//!                              └─────────► ClientSession ──► GET /stream
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use audiocast::pipeline::{PassthroughEncoder, Pipeline, PipelineConfig, ReaderCapture};
//! use audiocast::{BroadcastHub, ServerConfig, StreamServer};
//!
//! # async fn run() -> audiocast::Result<()> {
//! let hub = Arc::new(BroadcastHub::new());
//! let capture = ReaderCapture::stdin(4096);
//! let mut pipeline = Pipeline::spawn(
//!     capture,
//!     &PassthroughEncoder::default(),
//!     Arc::clone(&hub),
//!     PipelineConfig::default(),
//! )?;
//!
//! let server = StreamServer::new(ServerConfig::default(), hub);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! pipeline.shutdown().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hub;
pub mod media;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod stats;

pub use config::{AppConfig, ConfigError};
pub use error::{Error, Result};
pub use hub::{BroadcastHub, Chunk, HubConfig, HubError, OverflowPolicy, SessionId};
pub use pipeline::{Pipeline, PipelineConfig};
pub use server::{ServerConfig, StreamServer};
pub use session::{ClientSession, SessionHandle};
