//! Error types for the delivery engine.
//!
//! Failures are split along the axis the engine cares about: can the
//! delivery be retried later, or not? Transport problems carry their own
//! classification so the drain loop can choose between rescheduling an
//! item and dead-lettering it outright.

use courier_store::{ItemId, StoreError};

pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Top-level error for delivery operations.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The transport failed to hand the item to the remote endpoint
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The item has used up its whole retry budget
    #[error("Item {id} exhausted its retry budget after {attempts} attempts")]
    ExhaustedRetries { id: ItemId, attempts: u32 },

    /// The backing queue store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The engine or a transport was configured with invalid settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeliveryError {
    /// Whether the condition may clear on a later drain pass.
    ///
    /// Store errors abort the current pass but the next trigger starts a
    /// fresh one, so they count as retryable here.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Store(_) => true,
            Self::ExhaustedRetries { .. } | Self::Config(_) => false,
        }
    }
}

/// Classified failure from a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The endpoint could not be reached at all
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request failed before a status line was read
    #[error("Request failed: {0}")]
    Request(String),

    /// The endpoint answered with a retryable error status
    #[error("Endpoint returned status {code}")]
    Status { code: u16 },

    /// The endpoint permanently rejected the item
    #[error("Endpoint rejected the request with status {code}")]
    Rejected { code: u16 },

    /// The stored payload could not be decoded for dispatch
    #[error("Payload is not valid JSON: {0}")]
    InvalidPayload(String),
}

impl TransportError {
    /// Classify a non-success HTTP status.
    ///
    /// Timeouts (408), throttling (429) and server errors are worth
    /// retrying. Every other status is a contract violation on our side
    /// and will not heal on its own.
    #[must_use]
    pub const fn from_status(code: u16) -> Self {
        match code {
            408 | 429 | 500..=599 => Self::Status { code },
            _ => Self::Rejected { code },
        }
    }

    /// Whether a later attempt could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) | Self::Request(_) | Self::Status { .. } => true,
            Self::Rejected { .. } | Self::InvalidPayload(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}
