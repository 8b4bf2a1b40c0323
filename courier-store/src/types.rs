use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SerializationError;

/// Identifier for a queued item
///
/// This is a globally unique identifier (ULID) that serves as both the tracking ID
/// and the filename for persisted items. ULIDs are lexicographically sortable by
/// creation time and collision-resistant, so no coordination is needed between
/// producers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    id: ulid::Ulid,
}

impl ItemId {
    /// Parse an item ID from a filename like `01ARYZ6S41.bin`
    ///
    /// Validates that the filename is a valid ULID to prevent path traversal attacks.
    ///
    /// # Security
    /// This function explicitly rejects:
    /// - Path separators (/ and \)
    /// - Directory traversal patterns (..)
    /// - Invalid ULID format
    pub fn from_filename(filename: &str) -> Option<Self> {
        // Reject filenames with path separators
        if filename.contains('/') || filename.contains('\\') {
            return None;
        }

        // Reject filenames with directory traversal patterns
        if filename.contains("..") {
            return None;
        }

        let stem = filename.strip_suffix(".bin")?;

        let id = ulid::Ulid::from_string(stem).ok()?;

        Some(Self { id })
    }

    /// Create a new item ID from a ULID
    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique item ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Get the underlying ULID
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Get the timestamp (milliseconds since Unix epoch) encoded in this ULID
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for ItemId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

/// One queued event awaiting delivery
///
/// Items are created by a producer at enqueue time and mutated only by the
/// delivery engine: `attempt` grows on failed delivery, `delivered` flips to
/// true on success, and a cleanup pass removes delivered records. The payload
/// is held as canonical JSON text and never changes after creation, so every
/// retry resends exactly the bytes the producer handed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier, doubles as the on-disk filename
    pub id: ItemId,
    /// Tag selecting the destination route (e.g. `vitals`, `case.created`)
    pub kind: String,
    /// The event payload as JSON text, immutable once enqueued
    pub payload: String,
    /// When the item was enqueued; included in the delivered body
    pub created_at: DateTime<Utc>,
    /// Delivery attempts so far; only ever increases
    pub attempt: u32,
    /// Whether a transport call has succeeded for this item
    pub delivered: bool,
    /// Earliest time the next attempt may run; `None` means immediately
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Message of the most recent delivery failure
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Create a new pending item from any JSON-serializable payload
    ///
    /// # Errors
    /// If the payload cannot be serialized to JSON
    pub fn new<T: Serialize + ?Sized>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, SerializationError> {
        Ok(Self {
            id: ItemId::generate(),
            kind: kind.into(),
            payload: serde_json::to_string(payload)?,
            created_at: Utc::now(),
            attempt: 0,
            delivered: false,
            next_attempt_at: None,
            last_error: None,
        })
    }

    /// Parse the payload back into a JSON value for dispatch
    ///
    /// # Errors
    /// If the stored payload is not valid JSON (corrupted record)
    pub fn payload_value(&self) -> Result<serde_json::Value, SerializationError> {
        Ok(serde_json::from_str(&self.payload)?)
    }

    /// Whether this item is eligible for a delivery attempt at `now`
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Record a failed delivery attempt
    ///
    /// Bumps the attempt counter, remembers the error, and defers the next
    /// attempt until `next_attempt_at` (if given).
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        next_attempt_at: Option<DateTime<Utc>>,
    ) {
        self.attempt = self.attempt.saturating_add(1);
        self.last_error = Some(error.into());
        self.next_attempt_at = next_attempt_at;
    }

    /// Record a successful delivery
    pub fn mark_delivered(&mut self) {
        self.delivered = true;
        self.next_attempt_at = None;
    }
}
