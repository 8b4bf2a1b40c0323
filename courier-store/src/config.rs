use std::sync::Arc;

use serde::Deserialize;

use crate::{
    backends::{FileQueueStore, MemoryQueueStore},
    r#trait::QueueStore,
};

/// Configuration for the queue store backend
///
/// This enum allows runtime selection of the store implementation through
/// configuration files.
///
/// # Examples
///
/// File-backed store in RON config (the `unwrap_variant_newtypes`
/// extension lets the variant wrap its fields directly):
/// ```ron
/// #![enable(unwrap_variant_newtypes)]
/// Courier(
///     store: File(
///         path: "/var/spool/courier",
///     ),
/// )
/// ```
///
/// Memory-backed store for testing (unlimited capacity):
/// ```ron
/// #![enable(unwrap_variant_newtypes)]
/// Courier(
///     store: Memory(),
/// )
/// ```
///
/// Memory-backed store with a capacity limit:
/// ```ron
/// #![enable(unwrap_variant_newtypes)]
/// Courier(
///     store: Memory(
///         capacity: 1000,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    /// File-based store (production)
    File(FileQueueStore),
    /// Memory-based store (testing/development)
    ///
    /// Can optionally specify a capacity limit to prevent unbounded memory growth
    Memory(MemoryConfig),
}

/// Configuration for the memory-backed store
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryConfig {
    /// Maximum number of items to store (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File(FileQueueStore::default())
    }
}

impl StoreConfig {
    /// Get the filesystem path for file-backed stores, if applicable
    ///
    /// Returns `Some(path)` for the `File` variant, `None` for `Memory`.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(store) => Some(store.path()),
            Self::Memory(_) => None,
        }
    }

    /// Convert the configuration into an initialized store
    ///
    /// For file-backed stores this creates the spool directory and sweeps
    /// leftovers from a previous crash, failing fast on permission problems.
    /// The result is an Arc'd trait object used polymorphically by the
    /// delivery engine.
    ///
    /// # Errors
    /// Returns an error if file store initialization fails (directory
    /// creation, permissions, path validation)
    pub fn into_store(self) -> crate::Result<Arc<dyn QueueStore>> {
        match self {
            Self::File(store) => {
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory(config) => {
                let store = config
                    .capacity
                    .map_or_else(MemoryQueueStore::new, MemoryQueueStore::with_capacity);
                Ok(Arc::new(store))
            }
        }
    }
}
