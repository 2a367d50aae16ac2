use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// Snapshot of a call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Provider call id, "unknown" until a start frame names it
    pub call_id: String,

    pub state: SessionState,

    /// When the transport was accepted
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Audio frames received from the caller
    pub frames_received: u64,

    /// Audio chunks paced out to the caller
    pub frames_sent: u64,

    /// Turns that played out fully
    pub turns_completed: u64,

    /// Whether the caller's media stream is active
    pub stream_active: bool,

    pub turn_in_flight: bool,

    /// Liveness pings sent on the caller's leg
    pub heartbeats_sent: u64,
}

/// Live counters updated by the session's tasks
#[derive(Debug, Default)]
pub struct SessionCounters {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    turns_completed: AtomicU64,
}

impl SessionCounters {
    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, chunks: usize) {
        self.frames_sent.fetch_add(chunks as u64, Ordering::Relaxed);
    }

    pub fn record_turn(&self) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn turns_completed(&self) -> u64 {
        self.turns_completed.load(Ordering::Relaxed)
    }
}
