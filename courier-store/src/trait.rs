//! The durable storage contract the delivery engine drains from.

use async_trait::async_trait;

use crate::{
    Result,
    types::{ItemId, QueueItem},
};

/// Durable storage for queued items
///
/// Implementations must persist every mutation immediately (no write-behind
/// caching) so that a crash between enqueue and drain never loses an item.
/// The engine holds the store as `Arc<dyn QueueStore>` and is the only
/// mutator after enqueue; implementations only need to be safe against
/// concurrent readers plus one writer.
#[async_trait]
pub trait QueueStore: std::fmt::Debug + Send + Sync {
    /// Durably write one new item
    ///
    /// # Errors
    /// - If an item with the same ID already exists
    /// - If the underlying storage cannot be opened or written; callers
    ///   should surface this to the producer rather than dropping the event
    async fn put(&self, item: &QueueItem) -> Result<()>;

    /// Read one item by ID
    ///
    /// # Errors
    /// If the item does not exist or cannot be read
    async fn get(&self, id: &ItemId) -> Result<QueueItem>;

    /// Persist engine-side mutations (attempt counter, schedule, delivered flag)
    ///
    /// # Errors
    /// If the item does not exist or cannot be written
    async fn update(&self, item: &QueueItem) -> Result<()>;

    /// Flip an item's delivered flag to true
    ///
    /// Idempotent: marking an already-delivered item again, or an ID that no
    /// longer exists, is a no-op.
    ///
    /// # Errors
    /// If the underlying storage fails
    async fn mark_delivered(&self, id: &ItemId) -> Result<()>;

    /// Remove all currently delivered items, returning the count removed
    ///
    /// Safe to call repeatedly; a second call removes 0.
    ///
    /// # Errors
    /// If the underlying storage fails
    async fn delete_delivered(&self) -> Result<usize>;

    /// Remove one item regardless of its state (dead-letter eviction)
    ///
    /// # Errors
    /// If the item does not exist or cannot be removed
    async fn remove(&self, id: &ItemId) -> Result<()>;

    /// All items with `delivered == false`, sorted by ID (creation order)
    ///
    /// # Errors
    /// If the underlying storage cannot be listed
    async fn list_undelivered(&self) -> Result<Vec<QueueItem>>;

    /// All items regardless of state, sorted by ID; diagnostics and tests
    ///
    /// # Errors
    /// If the underlying storage cannot be listed
    async fn list_all(&self) -> Result<Vec<QueueItem>>;
}
