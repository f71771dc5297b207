//! Media format helpers

pub mod mpeg;

pub use mpeg::{find_frame_start, FrameHeader};
