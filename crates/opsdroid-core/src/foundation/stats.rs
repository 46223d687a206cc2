//! Dispatch statistics.
//!
//! Counters are updated lock-free from the dispatcher and from skill actions.
//! [`DispatchStats::snapshot`] produces a serializable view for the `/stats`
//! endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Runtime-wide dispatch counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    messages_parsed: AtomicU64,
    skills_matched: AtomicU64,
    actions_failed: AtomicU64,
    total_responses: AtomicU64,
    total_response_time_us: AtomicU64,
}

/// A point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Events handed to the dispatcher.
    pub messages_parsed: u64,
    /// Skill actions scheduled.
    pub skills_matched: u64,
    /// Skill actions that returned an error or panicked.
    pub actions_failed: u64,
    /// Events that received at least one response.
    pub total_responses: u64,
    /// Sum of first-response latencies, in seconds.
    pub total_response_time: f64,
    /// Mean first-response latency, in seconds.
    pub average_response_time: f64,
}

impl DispatchStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_parsed(&self) {
        self.messages_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_matched(&self, count: u64) {
        self.skills_matched.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.actions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the first response to an event.
    pub fn record_response(&self, latency: Duration) {
        self.total_responses.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_response_time_us
            .fetch_add(micros, Ordering::Relaxed);
    }

    /// Takes a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total_responses = self.total_responses.load(Ordering::Relaxed);
        let total_response_time =
            self.total_response_time_us.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let average_response_time = if total_responses == 0 {
            0.0
        } else {
            total_response_time / total_responses as f64
        };

        StatsSnapshot {
            messages_parsed: self.messages_parsed.load(Ordering::Relaxed),
            skills_matched: self.skills_matched.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
            total_responses,
            total_response_time,
            average_response_time,
        }
    }
}
