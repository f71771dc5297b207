//! Hub configuration

use std::time::Duration;

use serde::Deserialize;

/// What a session does when a chunk arrives and its queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued chunk to make room (freshness over completeness)
    #[default]
    DropOldest,
    /// Discard the incoming chunk
    DropNewest,
    /// Close the session; the client has to reconnect
    Disconnect,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowPolicy::DropOldest => "drop-oldest",
            OverflowPolicy::DropNewest => "drop-newest",
            OverflowPolicy::Disconnect => "disconnect",
        }
    }
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "drop-newest" | "drop_newest" => Ok(OverflowPolicy::DropNewest),
            "disconnect" => Ok(OverflowPolicy::Disconnect),
            other => Err(format!("unknown overflow policy: {}", other)),
        }
    }
}

/// Configuration for the broadcast hub and the sessions it creates
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of chunks queued per session
    pub queue_capacity: usize,

    /// Behavior when a session's queue is full
    pub overflow_policy: OverflowPolicy,

    /// Maximum concurrent sessions (0 = unlimited)
    pub max_sessions: usize,

    /// Longest a single network write may take before the session is closed
    pub write_timeout: Duration,

    /// Skip a new session's leading bytes up to the first MPEG audio frame header
    pub align_first_frame: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            overflow_policy: OverflowPolicy::DropOldest,
            max_sessions: 0, // Unlimited
            write_timeout: Duration::from_secs(10),
            align_first_frame: false,
        }
    }
}

impl HubConfig {
    /// Set the per-session queue capacity (at least one chunk)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set maximum concurrent sessions
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the per-write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enable MPEG audio frame alignment for late joiners
    pub fn align_first_frame(mut self, enabled: bool) -> Self {
        self.align_first_frame = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.max_sessions, 0);
        assert_eq!(config.write_timeout, Duration::from_secs(10));
        assert!(!config.align_first_frame);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = HubConfig::default().queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .queue_capacity(8)
            .overflow_policy(OverflowPolicy::Disconnect)
            .max_sessions(100)
            .write_timeout(Duration::from_millis(250))
            .align_first_frame(true);

        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.overflow_policy, OverflowPolicy::Disconnect);
        assert_eq!(config.max_sessions, 100);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert!(config.align_first_frame);
    }

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!(
            "drop-newest".parse::<OverflowPolicy>(),
            Ok(OverflowPolicy::DropNewest)
        );
        assert_eq!(
            "DROP_OLDEST".parse::<OverflowPolicy>(),
            Ok(OverflowPolicy::DropOldest)
        );
        assert!("block".parse::<OverflowPolicy>().is_err());
        assert_eq!(OverflowPolicy::Disconnect.to_string(), "disconnect");
    }
}
