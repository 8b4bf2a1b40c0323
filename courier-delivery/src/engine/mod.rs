//! The delivery engine.
//!
//! One engine owns one queue: producers enqueue items, the drain loop
//! dispatches them sequentially through the configured transport, failures
//! are rescheduled against the retry policy, and items that exhaust their
//! budget are dead-lettered exactly once. Everything the engine depends on
//! is injected, so the same loop serves a handheld syncing to its backend
//! and a server fanning events out to webhooks.

mod drain;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use courier_common::{Signal, internal};
use courier_store::{ItemId, QueueItem, QueueStore, StoreError};

use crate::{
    config::EngineConfig,
    error::DeliveryError,
    event::{DeadLetter, DrainReport, DrainTrigger},
    metrics::{EngineMetrics, MetricsSnapshot},
    transport::DeliveryTransport,
};

/// Capacity of the drain report broadcast. Reports are tiny and slow
/// consumers only lose history, never queue state.
const REPORT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct DeliveryEngine {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn DeliveryTransport>,
    config: EngineConfig,

    draining: AtomicBool,
    metrics: EngineMetrics,

    triggers_tx: mpsc::UnboundedSender<DrainTrigger>,
    triggers_rx: Mutex<Option<mpsc::UnboundedReceiver<DrainTrigger>>>,

    reports: broadcast::Sender<DrainReport>,

    dead_letters_tx: mpsc::UnboundedSender<DeadLetter>,
    dead_letters_rx: Mutex<Option<mpsc::UnboundedReceiver<DeadLetter>>>,
    dead_letter_consumer: AtomicBool,

    connectivity: Option<watch::Receiver<bool>>,
}

impl DeliveryEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn DeliveryTransport>,
        config: EngineConfig,
    ) -> Self {
        let (triggers_tx, triggers_rx) = mpsc::unbounded_channel();
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let (dead_letters_tx, dead_letters_rx) = mpsc::unbounded_channel();

        Self {
            store,
            transport,
            config,
            draining: AtomicBool::new(false),
            metrics: EngineMetrics::default(),
            triggers_tx,
            triggers_rx: Mutex::new(Some(triggers_rx)),
            reports,
            dead_letters_tx,
            dead_letters_rx: Mutex::new(Some(dead_letters_rx)),
            dead_letter_consumer: AtomicBool::new(false),
            connectivity: None,
        }
    }

    /// Attach a connectivity feed. The offline-to-online edge becomes a
    /// drain trigger and enqueue stops nudging the loop while offline.
    #[must_use]
    pub fn with_connectivity(mut self, receiver: watch::Receiver<bool>) -> Self {
        self.connectivity = Some(receiver);
        self
    }

    /// Persist a payload and hand it to the delivery loop.
    ///
    /// Returns as soon as the item is durable. Delivery happens on the
    /// drain loop, never on the caller.
    ///
    /// # Errors
    ///
    /// Returns a store error when the payload cannot be serialized or the
    /// item cannot be persisted. Failing to persist is the one case where
    /// the caller must fall back to delivering synchronously or surface
    /// the loss.
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        kind: impl Into<String>,
        payload: &T,
    ) -> crate::Result<ItemId> {
        let item = QueueItem::new(kind, payload).map_err(StoreError::from)?;
        let id = item.id.clone();

        self.store.put(&item).await?;
        self.metrics.record_enqueued();
        internal!(level = DEBUG, "Enqueued {} item {id}", item.kind);

        if self.config.drain_on_enqueue && self.is_online() {
            self.trigger_drain(DrainTrigger::Enqueue);
        }

        Ok(id)
    }

    /// Put a previously dead-lettered item back in the queue with a fresh
    /// retry budget.
    ///
    /// # Errors
    ///
    /// Returns a store error when the item cannot be persisted, including
    /// when an item with the same ID is already queued.
    pub async fn requeue(&self, mut item: QueueItem) -> crate::Result<ItemId> {
        item.attempt = 0;
        item.delivered = false;
        item.next_attempt_at = None;
        item.last_error = None;

        let id = item.id.clone();
        self.store.put(&item).await?;
        self.metrics.record_enqueued();
        internal!(level = INFO, "Requeued {} item {id}", item.kind);

        if self.config.drain_on_enqueue && self.is_online() {
            self.trigger_drain(DrainTrigger::Enqueue);
        }

        Ok(id)
    }

    /// Ask the serve loop for a drain pass without waiting for it.
    pub fn trigger_drain(&self, trigger: DrainTrigger) {
        if self.triggers_tx.send(trigger).is_err() {
            internal!(level = WARN, "Drain trigger ({trigger}) dropped: serve loop has stopped");
        }
    }

    /// Subscribe to per-pass outcome reports.
    #[must_use]
    pub fn subscribe_reports(&self) -> broadcast::Receiver<DrainReport> {
        self.reports.subscribe()
    }

    /// Take the dead-letter stream. Yields `None` after the first call;
    /// there is exactly one consumer so no letter is seen twice.
    pub fn dead_letters(&self) -> Option<mpsc::UnboundedReceiver<DeadLetter>> {
        let receiver = self.dead_letters_rx.lock().take();
        if receiver.is_some() {
            self.dead_letter_consumer.store(true, Ordering::SeqCst);
        }
        receiver
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Without a connectivity feed the engine assumes it is online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.connectivity.as_ref().is_none_or(|rx| *rx.borrow())
    }

    /// Run the drain loop until shutdown.
    ///
    /// Passes start from the periodic timer, from queued triggers, and
    /// from connectivity restoration. The first pass runs immediately to
    /// pick up backlog persisted by a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] when called twice; the loop can
    /// only run once per engine.
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> crate::Result<()> {
        let mut triggers = self
            .triggers_rx
            .lock()
            .take()
            .ok_or_else(|| DeliveryError::Config("Engine serve loop already started".to_string()))?;
        let mut connectivity = self.connectivity.clone();

        let mut drain_timer =
            tokio::time::interval(Duration::from_secs(self.config.drain_interval_secs.max(1)));

        internal!(
            level = INFO,
            "Delivery engine started ({} transport, {}s drain interval)",
            self.transport.name(),
            self.config.drain_interval_secs
        );

        // The interval's first tick is immediate; spend it on the startup
        // pass.
        drain_timer.tick().await;
        self.run_drain(DrainTrigger::Startup).await;

        loop {
            tokio::select! {
                _ = drain_timer.tick() => {
                    self.run_drain(DrainTrigger::Timer).await;
                }

                Some(trigger) = triggers.recv() => {
                    self.run_drain(trigger).await;
                }

                online = connectivity_edge(&mut connectivity) => {
                    if online {
                        internal!(level = INFO, "Connectivity restored, draining queued items");
                        self.run_drain(DrainTrigger::ConnectivityRestored).await;
                    } else {
                        internal!(
                            level = INFO,
                            "Connectivity lost, holding deliveries until restored"
                        );
                    }
                }

                Ok(signal) = shutdown.recv() => {
                    internal!(level = INFO, "Delivery engine received signal: {signal:?}");
                    break;
                }
            }
        }

        self.wait_for_drain_completion().await;
        internal!(level = INFO, "Delivery engine stopped; {}", self.metrics.snapshot());

        Ok(())
    }

    async fn run_drain(&self, trigger: DrainTrigger) {
        if let Err(error) = self.drain(trigger).await {
            internal!(level = ERROR, "Drain pass ({trigger}) aborted: {error}");
        }
    }

    /// A drain pass started outside the serve loop may still be running
    /// when shutdown arrives. Give it a bounded window to finish.
    async fn wait_for_drain_completion(&self) {
        if !self.is_draining() {
            return;
        }

        internal!(
            level = INFO,
            "Waiting up to {}s for the in-flight drain pass to finish",
            self.config.shutdown_wait_secs
        );

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.shutdown_wait_secs);

        while self.is_draining() {
            if tokio::time::Instant::now() >= deadline {
                internal!(level = WARN, "Shutdown wait elapsed with a drain pass still in flight");
                return;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Resolves with the new state when the connectivity feed flips. Stays
/// pending forever without a feed, keeping its select arm inert.
async fn connectivity_edge(receiver: &mut Option<watch::Receiver<bool>>) -> bool {
    match receiver.as_mut() {
        Some(rx) => {
            if rx.changed().await.is_ok() {
                *rx.borrow_and_update()
            } else {
                std::future::pending().await
            }
        }
        None => std::future::pending().await,
    }
}
