//! Engine counters.
//!
//! Plain atomics rather than a metrics pipeline. The composition root logs
//! a snapshot on shutdown and embedders can poll one whenever they like.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by the engine as it works.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    transient_failures: AtomicU64,
    dead_lettered: AtomicU64,
    drains_started: AtomicU64,
    drains_skipped: AtomicU64,
    cleaned: AtomicU64,
}

impl EngineMetrics {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drain_started(&self) {
        self.drains_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drain_skipped(&self) {
        self.drains_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cleaned(&self, count: u64) {
        self.cleaned.fetch_add(count, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            drains_started: self.drains_started.load(Ordering::Relaxed),
            drains_skipped: self.drains_skipped.load(Ordering::Relaxed),
            cleaned: self.cleaned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub transient_failures: u64,
    pub dead_lettered: u64,
    pub drains_started: u64,
    pub drains_skipped: u64,
    pub cleaned: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "enqueued={} delivered={} transient_failures={} dead_lettered={} drains_started={} drains_skipped={} cleaned={}",
            self.enqueued,
            self.delivered,
            self.transient_failures,
            self.dead_lettered,
            self.drains_started,
            self.drains_skipped,
            self.cleaned
        )
    }
}
