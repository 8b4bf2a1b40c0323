//! Programmable transport for exercising the engine without a network.

#![allow(dead_code)] // Test utility module - not all helpers used in every test

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use courier_delivery::{DeliveryTransport, TransportError};
use courier_store::QueueItem;

type Script = Box<dyn Fn(&QueueItem, usize) -> Result<(), TransportError> + Send + Sync>;

/// Scripted [`DeliveryTransport`] that records every attempt.
pub struct MockTransport {
    script: Script,
    delay: Option<Duration>,
    total_calls: AtomicUsize,
    attempts: Mutex<HashMap<String, usize>>,
    delivered: Mutex<Vec<String>>,
}

impl MockTransport {
    /// The script receives the item and the 1-based attempt number for
    /// that particular item.
    pub fn new(
        script: impl Fn(&QueueItem, usize) -> Result<(), TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            total_calls: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(|_, _| Ok(()))
    }

    pub fn always_unreachable() -> Self {
        Self::new(|_, _| Err(TransportError::Connect("connection refused".to_string())))
    }

    /// Sleep before every attempt, to hold a drain pass open.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// IDs of successfully delivered items, in dispatch order.
    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }

    pub fn attempts_for(&self, id: &str) -> usize {
        self.attempts.lock().get(id).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("total_calls", &self.total_calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeliveryTransport for MockTransport {
    async fn deliver(&self, item: &QueueItem) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self.attempts.lock();
            let count = attempts.entry(item.id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let result = (self.script)(item, attempt);
        if result.is_ok() {
            self.delivered.lock().push(item.id.to_string());
        }
        result
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
