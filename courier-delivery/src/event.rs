//! Events published by the delivery engine.
//!
//! Drain reports feed user-facing surfaces (sync toasts, dashboards) and
//! dead letters feed whatever remediation path the embedding application
//! wires up. Both are broadcast out of band so the drain loop never waits
//! on a consumer.

use chrono::{DateTime, Utc};

use courier_store::QueueItem;

/// What caused a drain pass to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// The periodic drain timer fired
    Timer,
    /// Connectivity came back after an offline stretch
    ConnectivityRestored,
    /// An item was just enqueued
    Enqueue,
    /// A caller asked for an immediate pass
    Explicit,
    /// First pass after the engine started, picking up persisted backlog
    Startup,
}

impl std::fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer => write!(f, "timer"),
            Self::ConnectivityRestored => write!(f, "connectivity-restored"),
            Self::Enqueue => write!(f, "enqueue"),
            Self::Explicit => write!(f, "explicit"),
            Self::Startup => write!(f, "startup"),
        }
    }
}

/// Aggregate outcome of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub trigger: DrainTrigger,
    /// Items handed off and acknowledged by the endpoint
    pub succeeded: usize,
    /// Items that failed and were rescheduled for a later pass
    pub failed: usize,
    /// Items dropped from the queue after exhausting their retry budget
    pub dead_lettered: usize,
    /// Delivered records purged from the store at the end of the pass
    pub cleaned: usize,
}

impl DrainReport {
    #[must_use]
    pub const fn new(trigger: DrainTrigger) -> Self {
        Self {
            trigger,
            succeeded: 0,
            failed: 0,
            dead_lettered: 0,
            cleaned: 0,
        }
    }

    /// Whether the pass touched anything at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.succeeded == 0 && self.failed == 0 && self.dead_lettered == 0 && self.cleaned == 0
    }
}

impl std::fmt::Display for DrainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} delivered, {} failed, {} dead-lettered, {} cleaned ({})",
            self.succeeded, self.failed, self.dead_lettered, self.cleaned, self.trigger
        )
    }
}

/// Why an item was removed from the queue without being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// Every attempt failed and the retry budget ran out
    ExhaustedRetries { attempts: u32 },
    /// The endpoint rejected the item with a non-retryable status
    Rejected { code: u16 },
    /// The stored payload could not be decoded for dispatch
    InvalidPayload,
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExhaustedRetries { attempts } => {
                write!(f, "exhausted retry budget after {attempts} attempts")
            }
            Self::Rejected { code } => write!(f, "rejected by endpoint with status {code}"),
            Self::InvalidPayload => write!(f, "payload could not be decoded"),
        }
    }
}

/// An undeliverable item, emitted exactly once before it leaves the store.
///
/// The full item rides along so consumers can persist it elsewhere or feed
/// it back through [`requeue`](crate::DeliveryEngine::requeue).
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub item: QueueItem,
    pub reason: DeadLetterReason,
    pub dead_at: DateTime<Utc>,
}
