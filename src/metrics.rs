//! Aggregate request and upstream counters for the observability endpoints.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Lock-free counters shared by the dispatcher and the upstream adapter.
///
/// Purely observational; nothing in request processing branches on these.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    requests: AtomicU64,
    upstream_calls: AtomicU64,
    upstream_failures: AtomicU64,
    active_connections: AtomicUsize,
    prewarmed: AtomicBool,
}

/// Snapshot of the counters for JSON rendering.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub active_connections: usize,
    pub prewarmed: bool,
}

impl GatewayMetrics {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_call(&self) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_prewarmed(&self) {
        self.prewarmed.store(true, Ordering::Relaxed);
    }

    /// Increments the active-connection gauge for the lifetime of the guard.
    pub fn track_connection(&self) -> ConnectionGuard<'_> {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { metrics: self }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            prewarmed: self.prewarmed.load(Ordering::Relaxed),
        }
    }
}

/// RAII guard that decrements the gauge when the upstream call ends,
/// including on cancellation.
pub struct ConnectionGuard<'a> {
    metrics: &'a GatewayMetrics,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.metrics
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}
