//! Error types for the courier-store crate.
//!
//! This module provides typed error handling for queue storage operations
//! including file I/O, serialization, and validation.

use std::io;

use thiserror::Error;

use crate::ItemId;

/// Top-level store error type.
///
/// All store operations return this error type, which categorizes failures
/// into I/O, serialization, validation, and logical errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (file read/write/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Item not found in the store.
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// Item already exists in the store.
    #[error("Item already exists: {0}")]
    AlreadyExists(ItemId),

    /// Store directory validation failed.
    #[error("Store validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, capacity, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed.
    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Payload is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record data is corrupted or incomplete.
    #[error("Corrupted record data: {0}")]
    Corrupted(String),
}

/// Store directory validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Store path is not absolute.
    #[error("Store path must be absolute: {0}")]
    NotAbsolute(String),

    /// Store path contains directory traversal components.
    #[error("Store path cannot contain '..' components: {0}")]
    ParentComponent(String),

    /// Store path points into a sensitive system directory.
    #[error("Store path cannot be in system directory: {0}")]
    SystemDirectory(String),

    /// Store path exists but is not a directory.
    #[error("Store path is not a directory: {0}")]
    NotDirectory(String),

    /// Invalid store configuration.
    #[error("Invalid store configuration: {0}")]
    InvalidConfiguration(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
