//! Channel counters, exported as JSON on the health route.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Channel server metrics
#[derive(Default)]
pub struct ChannelMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub auth_rejected: AtomicU64,

    // Session counters
    pub sessions_started: AtomicU64,
    pub sessions_active: AtomicU64,
    pub spawn_failures: AtomicU64,

    // Placement counters
    pub placements_ok: AtomicU64,
    pub placements_failed: AtomicU64,
}

/// Point-in-time copy of [`ChannelMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub auth_rejected: u64,
    pub sessions_started: u64,
    pub sessions_active: u64,
    pub spawn_failures: u64,
    pub placements_ok: u64,
    pub placements_failed: u64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_rejection(&self) {
        self.auth_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_ended(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_spawn_failure(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_placement(&self, success: bool) {
        if success {
            self.placements_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.placements_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            auth_rejected: self.auth_rejected.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            placements_ok: self.placements_ok.load(Ordering::Relaxed),
            placements_failed: self.placements_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let s = self.snapshot();
        serde_json::json!({
            "requests": {
                "total": s.requests_total,
                "auth_rejected": s.auth_rejected,
            },
            "sessions": {
                "started": s.sessions_started,
                "active": s.sessions_active,
                "spawn_failures": s.spawn_failures,
            },
            "placement": {
                "ok": s.placements_ok,
                "failed": s.placements_failed,
            }
        })
    }
}
