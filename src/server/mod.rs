//! HTTP front door
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | Landing page with an audio player pointed at `/stream` |
//! | `/stream`, `/stream.mp3` | Live audio, one hub session per request |
//! | `/stats` | Hub counters as JSON |
//!
//! A `/stream` request registers a session, spawns its drain task into an
//! in-memory pipe and returns the read half as the response body. When the
//! listener hangs up the body is dropped, which closes the session.

pub mod config;
pub mod listener;
mod routes;

pub use config::ServerConfig;
pub use listener::StreamServer;
