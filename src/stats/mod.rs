//! Statistics collected by the hub, sessions and pipeline

pub mod metrics;

pub(crate) use metrics::{HubCounters, PipelineCounters, SessionCounters};
pub use metrics::{HubStats, PipelineStats, SessionStats};
