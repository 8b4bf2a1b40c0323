//! Store wrapper with injectable failures.

#![allow(dead_code)] // Test utility module - not all helpers used in every test

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use courier_store::{ItemId, MemoryQueueStore, QueueItem, QueueStore, StoreError};

/// Memory store that can be told to fail listings, simulating an
/// unreadable backing directory.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryQueueStore,
    fail_listing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    fn listing_error() -> StoreError {
        StoreError::Internal("injected listing failure".to_string())
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn put(&self, item: &QueueItem) -> courier_store::Result<()> {
        self.inner.put(item).await
    }

    async fn get(&self, id: &ItemId) -> courier_store::Result<QueueItem> {
        self.inner.get(id).await
    }

    async fn update(&self, item: &QueueItem) -> courier_store::Result<()> {
        self.inner.update(item).await
    }

    async fn mark_delivered(&self, id: &ItemId) -> courier_store::Result<()> {
        self.inner.mark_delivered(id).await
    }

    async fn delete_delivered(&self) -> courier_store::Result<usize> {
        self.inner.delete_delivered().await
    }

    async fn remove(&self, id: &ItemId) -> courier_store::Result<()> {
        self.inner.remove(id).await
    }

    async fn list_undelivered(&self) -> courier_store::Result<Vec<QueueItem>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Self::listing_error());
        }
        self.inner.list_undelivered().await
    }

    async fn list_all(&self) -> courier_store::Result<Vec<QueueItem>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Self::listing_error());
        }
        self.inner.list_all().await
    }
}
