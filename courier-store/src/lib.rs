pub mod backends;
pub mod config;
pub mod error;
pub mod r#trait;
pub mod types;

pub use backends::{FileQueueStore, FileQueueStoreBuilder, MemoryQueueStore, TestQueueStore};
pub use config::{MemoryConfig, StoreConfig};
pub use error::{Result, SerializationError, StoreError, ValidationError};
pub use r#trait::QueueStore;
pub use types::{ItemId, QueueItem};
