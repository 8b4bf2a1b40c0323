//! The drain pass: sequential dispatch of every due item.

use std::sync::atomic::Ordering;

use chrono::Utc;

use courier_common::{dispatch, internal};
use courier_store::{QueueItem, StoreError};

use crate::{
    error::{DeliveryError, TransportError},
    event::{DeadLetter, DeadLetterReason, DrainReport, DrainTrigger},
};

use super::DeliveryEngine;

impl DeliveryEngine {
    /// Run one drain pass.
    ///
    /// Returns `Ok(None)` when another pass is already in flight (that
    /// pass covers the caller's items) or while the connectivity feed
    /// reports offline. An error means the queue could not be listed and
    /// the pass never started.
    pub async fn drain(&self, trigger: DrainTrigger) -> crate::Result<Option<DrainReport>> {
        if !self.is_online() {
            // Attempts made while provably offline would only spend the
            // retry budget. Items hold until the restore edge.
            internal!(level = DEBUG, "Drain ({trigger}) deferred until connectivity returns");
            return Ok(None);
        }

        if self.draining.swap(true, Ordering::SeqCst) {
            self.metrics.record_drain_skipped();
            internal!(level = DEBUG, "Drain ({trigger}) skipped: a pass is already in flight");
            return Ok(None);
        }

        let result = self.drain_pass(trigger).await;
        self.draining.store(false, Ordering::SeqCst);

        let report = result?;

        if report.is_empty() {
            internal!(level = TRACE, "Drain ({trigger}): nothing to deliver");
        } else {
            internal!(level = INFO, "Drain complete: {report}");
            let _ = self.reports.send(report);
        }

        Ok(Some(report))
    }

    async fn drain_pass(&self, trigger: DrainTrigger) -> crate::Result<DrainReport> {
        self.metrics.record_drain_started();
        let mut report = DrainReport::new(trigger);

        let items = self.store.list_undelivered().await?;
        if items.is_empty() {
            return Ok(report);
        }

        internal!(level = DEBUG, "Draining {} undelivered items ({trigger})", items.len());

        let now = Utc::now();
        for item in items {
            if !item.is_due(now) {
                continue;
            }

            self.dispatch_item(item, &mut report).await;
        }

        match self.store.delete_delivered().await {
            Ok(cleaned) => {
                report.cleaned = cleaned;
                self.metrics
                    .record_cleaned(u64::try_from(cleaned).unwrap_or(u64::MAX));
            }
            Err(error) => {
                // Delivered records stay flagged and get purged by a
                // later pass.
                internal!(level = ERROR, "Failed to purge delivered items: {error}");
            }
        }

        Ok(report)
    }

    async fn dispatch_item(&self, mut item: QueueItem, report: &mut DrainReport) {
        dispatch!(
            level = TRACE,
            "Dispatching {} item {} via {} (attempt {} of {})",
            item.kind,
            item.id,
            self.transport.name(),
            item.attempt.saturating_add(1),
            self.config.retry.max_attempts
        );

        match self.transport.deliver(&item).await {
            Ok(()) => {
                if let Err(error) = self.store.mark_delivered(&item.id).await {
                    // The endpoint has the item. A lost mark means a
                    // possible duplicate next pass, not a loss.
                    internal!(
                        level = ERROR,
                        "Delivered item {} but failed to mark it: {error}",
                        item.id
                    );
                }

                self.metrics.record_delivered();
                report.succeeded += 1;
                dispatch!(level = DEBUG, "Delivered {} item {}", item.kind, item.id);
            }

            Err(error) if error.is_retryable() => {
                self.reschedule(item, &error, report).await;
            }

            Err(error) => {
                let reason = match &error {
                    TransportError::Rejected { code } => DeadLetterReason::Rejected { code: *code },
                    _ => DeadLetterReason::InvalidPayload,
                };

                item.record_failure(error.to_string(), None);
                self.dead_letter(item, reason, report).await;
            }
        }
    }

    /// Record a retryable failure: either push the item back with a new
    /// schedule or, with the budget spent, dead-letter it.
    async fn reschedule(
        &self,
        mut item: QueueItem,
        error: &TransportError,
        report: &mut DrainReport,
    ) {
        let policy = &self.config.retry;
        let next_attempt_at = policy.next_attempt_at(item.attempt.saturating_add(1), Utc::now());
        item.record_failure(error.to_string(), Some(next_attempt_at));

        if policy.should_retry(item.attempt) {
            match self.store.update(&item).await {
                Ok(()) => {
                    internal!(
                        level = WARN,
                        "Delivery of {} item {} failed (attempt {} of {}): {error}; retrying after {}",
                        item.kind,
                        item.id,
                        item.attempt,
                        policy.max_attempts,
                        next_attempt_at.to_rfc3339()
                    );
                }
                Err(store_error) => {
                    // The old schedule stays on disk; the item retries
                    // from that state instead.
                    internal!(
                        level = ERROR,
                        "Failed to persist retry state for item {}: {store_error}",
                        item.id
                    );
                }
            }

            self.metrics.record_transient_failure();
            report.failed += 1;
        } else {
            let exhausted = DeliveryError::ExhaustedRetries {
                id: item.id.clone(),
                attempts: item.attempt,
            };
            internal!(level = WARN, "{exhausted}; last error: {error}");

            let attempts = item.attempt;
            self.dead_letter(item, DeadLetterReason::ExhaustedRetries { attempts }, report)
                .await;
        }
    }

    /// Remove an undeliverable item and announce it exactly once.
    ///
    /// The payload is logged before anything else so the record survives
    /// even with no dead-letter consumer attached. Removal precedes
    /// emission: a letter goes out only after its item has left the queue.
    async fn dead_letter(
        &self,
        item: QueueItem,
        reason: DeadLetterReason,
        report: &mut DrainReport,
    ) {
        internal!(
            level = ERROR,
            "Dead-lettering {} item {} ({reason}); payload: {}",
            item.kind,
            item.id,
            item.payload
        );

        match self.store.remove(&item.id).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(error) => {
                // Still queued; the next pass lands here again.
                internal!(
                    level = ERROR,
                    "Failed to remove item {} for dead-lettering: {error}",
                    item.id
                );
                report.failed += 1;
                return;
            }
        }

        self.metrics.record_dead_lettered();
        report.dead_lettered += 1;

        if self.dead_letter_consumer.load(Ordering::SeqCst)
            && self
                .dead_letters_tx
                .send(DeadLetter {
                    item,
                    reason,
                    dead_at: Utc::now(),
                })
                .is_err()
        {
            internal!(level = DEBUG, "Dead-letter consumer has gone away");
        }
    }
}
