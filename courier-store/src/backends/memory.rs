use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::{
    StoreError,
    r#trait::QueueStore,
    types::{ItemId, QueueItem},
};

/// In-memory queue store implementation
///
/// This implementation keeps items in a `HashMap` protected by an `RwLock`.
/// It waives the durability guarantees of the contract and is primarily
/// intended for tests, but can also back a transient queue where losing
/// items on process exit is acceptable.
///
/// # Capacity Management
/// The store can be configured with a maximum capacity to prevent unbounded
/// memory growth. When capacity is reached, `put` fails with an error. This
/// is useful for:
/// - Testing capacity-related error handling
/// - Preventing memory exhaustion if accidentally used in production
///
/// # Concurrency
/// Uses an `RwLock` for interior mutability, which matches the engine's
/// access pattern of many short read-modify-write operations.
#[derive(Debug, Clone)]
pub struct MemoryQueueStore {
    pub(crate) items: Arc<RwLock<HashMap<ItemId, QueueItem>>>,
    /// Maximum number of items to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryQueueStore {
    /// Create a new empty memory store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            capacity: None,
        }
    }

    /// Create a new memory store with a capacity limit
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            capacity: Some(capacity),
        }
    }

    /// Get the current number of items in the store
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn sorted(mut items: Vec<QueueItem>) -> Vec<QueueItem> {
        // ULIDs are lexicographically sortable by creation time
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn put(&self, item: &QueueItem) -> crate::Result<()> {
        let mut items = self.items.write()?;

        if items.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(item.id.clone()));
        }

        if let Some(cap) = self.capacity
            && items.len() >= cap
        {
            return Err(StoreError::Internal(format!(
                "Memory store capacity exceeded: {}/{cap} items",
                items.len()
            )));
        }

        items.insert(item.id.clone(), item.clone());

        Ok(())
    }

    async fn get(&self, id: &ItemId) -> crate::Result<QueueItem> {
        self.items
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update(&self, item: &QueueItem) -> crate::Result<()> {
        let mut items = self.items.write()?;

        if items.contains_key(&item.id) {
            items.insert(item.id.clone(), item.clone());
            Ok(())
        } else {
            Err(StoreError::NotFound(item.id.clone()))
        }
    }

    async fn mark_delivered(&self, id: &ItemId) -> crate::Result<()> {
        if let Some(item) = self.items.write()?.get_mut(id) {
            item.mark_delivered();
        }

        Ok(())
    }

    async fn delete_delivered(&self) -> crate::Result<usize> {
        let mut items = self.items.write()?;
        let before = items.len();
        items.retain(|_, item| !item.delivered);
        Ok(before - items.len())
    }

    async fn remove(&self, id: &ItemId) -> crate::Result<()> {
        self.items
            .write()?
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(())
    }

    async fn list_undelivered(&self) -> crate::Result<Vec<QueueItem>> {
        let items = self
            .items
            .read()?
            .values()
            .filter(|item| !item.delivered)
            .cloned()
            .collect();

        Ok(Self::sorted(items))
    }

    async fn list_all(&self) -> crate::Result<Vec<QueueItem>> {
        let items = self.items.read()?.values().cloned().collect();

        Ok(Self::sorted(items))
    }
}
