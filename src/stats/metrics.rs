//! Statistics and metrics for the hub, its sessions and the producer

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::hub::SessionId;

/// Live per-session counters, updated by the producer and the drain task
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub chunks_enqueued: AtomicU64,
    pub chunks_dropped: AtomicU64,
    pub chunks_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl SessionCounters {
    pub fn record_enqueued(&self) {
        self.chunks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.chunks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

/// Session-level statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Session id
    pub id: SessionId,
    /// Chunks accepted into the queue
    pub chunks_enqueued: u64,
    /// Chunks lost to the overflow policy or frame alignment
    pub chunks_dropped: u64,
    /// Chunks written to the client
    pub chunks_sent: u64,
    /// Bytes written to the client
    pub bytes_sent: u64,
    /// Chunks currently waiting in the queue
    pub queued: usize,
    /// Bytes currently waiting in the queue
    pub queued_bytes: usize,
    /// Time since registration
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl SessionStats {
    /// Outgoing bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

/// Live hub-wide counters
#[derive(Debug, Default)]
pub(crate) struct HubCounters {
    pub total_sessions: AtomicU64,
    pub chunks_broadcast: AtomicU64,
    pub bytes_broadcast: AtomicU64,
    pub chunks_dropped: AtomicU64,
    pub sessions_overflowed: AtomicU64,
}

/// Hub-wide statistics snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    /// Sessions currently registered
    pub active_sessions: usize,
    /// Sessions ever registered
    pub total_sessions: u64,
    /// Chunks passed to `broadcast`
    pub chunks_broadcast: u64,
    /// Bytes passed to `broadcast`
    pub bytes_broadcast: u64,
    /// Chunks any session dropped, including sessions since closed
    pub chunks_dropped: u64,
    /// Sessions closed by the `disconnect` overflow policy
    pub sessions_overflowed: u64,
    /// Whether the shutdown sweep has run
    pub shutting_down: bool,
    /// Time since the hub was created
    #[serde(rename = "uptime_ms", serialize_with = "as_millis")]
    pub uptime: Duration,
}

impl HubStats {
    /// Average incoming bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_broadcast * 8) / secs
        } else {
            0
        }
    }
}

/// Producer-side counters for the capture -> encoder -> hub pipeline
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    pub frames_captured: AtomicU64,
    pub bytes_captured: AtomicU64,
    pub chunks_encoded: AtomicU64,
    pub bytes_encoded: AtomicU64,
}

impl PipelineCounters {
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            chunks_encoded: self.chunks_encoded.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
        }
    }
}

/// Producer statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Raw frames read from the capture source
    pub frames_captured: u64,
    /// Raw bytes read from the capture source
    pub bytes_captured: u64,
    /// Encoded chunks handed to the hub
    pub chunks_encoded: u64,
    /// Encoded bytes handed to the hub
    pub bytes_encoded: u64,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_stats(bytes_sent: u64, duration: Duration) -> SessionStats {
        SessionStats {
            id: SessionId::new(1),
            chunks_enqueued: 0,
            chunks_dropped: 0,
            chunks_sent: 0,
            bytes_sent,
            queued: 0,
            queued_bytes: 0,
            duration,
        }
    }

    #[test]
    fn test_session_counters() {
        let counters = SessionCounters::default();
        counters.record_enqueued();
        counters.record_enqueued();
        counters.record_dropped();
        counters.record_sent(417);

        assert_eq!(counters.chunks_enqueued.load(Ordering::Relaxed), 2);
        assert_eq!(counters.chunks_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(counters.chunks_sent.load(Ordering::Relaxed), 1);
        assert_eq!(counters.bytes_sent.load(Ordering::Relaxed), 417);
    }

    #[test]
    fn test_session_stats_bitrate() {
        // 160,000 bytes * 8 bits / 10 seconds = 128,000 bps
        let stats = session_stats(160_000, Duration::from_secs(10));
        assert_eq!(stats.bitrate(), 128_000);
    }

    #[test]
    fn test_session_stats_bitrate_zero_duration() {
        let stats = session_stats(1_000_000, Duration::ZERO);
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_hub_stats_serialize() {
        let stats = HubStats {
            active_sessions: 2,
            uptime: Duration::from_millis(1500),
            ..Default::default()
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["active_sessions"], 2);
        assert_eq!(json["uptime_ms"], 1500);
        assert_eq!(json["shutting_down"], false);
    }

    #[test]
    fn test_pipeline_snapshot() {
        let counters = PipelineCounters::default();
        counters.frames_captured.fetch_add(3, Ordering::Relaxed);
        counters.bytes_encoded.fetch_add(1024, Ordering::Relaxed);

        let stats = counters.snapshot();
        assert_eq!(stats.frames_captured, 3);
        assert_eq!(stats.bytes_encoded, 1024);
        assert_eq!(stats.chunks_encoded, 0);
    }
}
