//! Backend storage implementations for the queue
//!
//! This module contains the different queue store implementations:
//! - `memory`: In-memory storage for tests and transient queues
//! - `test`: Test utilities with synchronization primitives
//! - `file`: File-based storage for production use

pub mod file;
pub mod memory;

pub use file::{FileQueueStore, FileQueueStoreBuilder};
pub use memory::MemoryQueueStore;
pub use test::TestQueueStore;
