use std::path::{Path, PathBuf};

use async_trait::async_trait;
use courier_common::internal;
use serde::Deserialize;
use tokio::fs;

use crate::{
    StoreError, ValidationError,
    error::SerializationError,
    r#trait::QueueStore,
    types::{ItemId, QueueItem},
};

/// File-based queue store implementation
///
/// This implementation stores one item per file in a spool directory using
/// ULID (Universally Unique Lexicographically Sortable Identifier) filenames:
/// `{item_id}.bin` contains the whole record (metadata plus payload) encoded
/// with bincode.
///
/// The item ID is a 26-character ULID that encodes both timestamp and
/// randomness, ensuring global uniqueness and lexicographic sortability.
///
/// # Security
/// - Uses atomic writes (write to temp file, then rename) to prevent corruption
/// - Validates all filename components to prevent path traversal
/// - Only reads files matching the expected naming pattern (valid ULIDs)
///
/// # Atomicity
/// All write operations use the "write to temp, then rename" pattern so a
/// partial write never leaves the store in an inconsistent state. Deletes are
/// two-phase (rename to `.deleted`, then unlink); leftovers from a crash are
/// swept by `init()`.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl Default for FileQueueStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/spool/courier"),
        }
    }
}

// Custom Deserialize implementation with path validation
impl<'de> Deserialize<'de> for FileQueueStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileQueueStoreHelper {
            path: PathBuf,
        }

        let helper = FileQueueStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self { path: helper.path })
    }
}

impl FileQueueStore {
    /// Validate a store path for security
    ///
    /// # Security Checks
    /// - Rejects paths containing `..` (directory traversal)
    /// - Rejects paths to sensitive system directories
    /// - Ensures the path is absolute
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    fn validate_path(path: &Path) -> Result<(), ValidationError> {
        for component in path.components() {
            if component == std::path::Component::ParentDir {
                return Err(ValidationError::ParentComponent(
                    path.display().to_string(),
                ));
            }
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        let sensitive_prefixes = [
            "/etc",
            "/bin",
            "/sbin",
            "/usr/bin",
            "/usr/sbin",
            "/boot",
            "/sys",
            "/proc",
            "/dev",
        ];

        for prefix in &sensitive_prefixes {
            if path.starts_with(prefix) {
                return Err(ValidationError::SystemDirectory(format!(
                    "{prefix}: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Create a new `FileQueueStore` builder
    #[must_use]
    pub fn builder() -> FileQueueStoreBuilder {
        FileQueueStoreBuilder::default()
    }

    /// The spool directory this store writes to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Initialize the file-backed store
    ///
    /// Creates the spool directory if it doesn't exist and validates that
    /// the path is actually a directory. Also sweeps any orphaned `.tmp_`
    /// and `.deleted` files left behind by a previous crash.
    ///
    /// # Errors
    /// - If the spool directory cannot be created
    /// - If the path exists but is not a directory
    ///
    /// This should be called during application startup to fail fast if there
    /// are permission issues with the spool directory.
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising queue store ...");

        let path = Path::new(&self.path);
        if !path.try_exists()? {
            internal!("{:#?} does not exist, creating...", self.path);
            std::fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(ValidationError::NotDirectory(path.display().to_string()).into());
        }

        self.sweep_stale_files()?;

        Ok(())
    }

    /// Sweep leftovers from incomplete write or delete operations
    ///
    /// `.tmp_` files are partial writes that never got renamed into place;
    /// `.deleted` files were renamed for removal but not unlinked. Neither is
    /// ever read by `list`, so removing them here only reclaims space.
    fn sweep_stale_files(&self) -> crate::Result<()> {
        let entries = std::fs::read_dir(&self.path)?;
        let mut swept = 0;

        for entry in entries {
            let entry = entry?;
            let filename = entry.file_name();
            let filename_str = filename.to_string_lossy();

            if filename_str.starts_with(".tmp_") || filename_str.ends_with(".deleted") {
                std::fs::remove_file(entry.path())?;
                swept += 1;
            }
        }

        if swept > 0 {
            internal!(
                level = INFO,
                "Swept {swept} stale files from the queue store"
            );
        }

        Ok(())
    }

    fn record_path(&self, id: &ItemId) -> PathBuf {
        self.path.join(format!("{id}.bin"))
    }

    /// Encode a record and move it into place atomically
    async fn write_record(&self, item: &QueueItem) -> crate::Result<()> {
        let filename = format!("{}.bin", item.id);
        let record_path = self.path.join(&filename);
        let temp_path = self.path.join(format!(".tmp_{filename}"));

        let encoded = bincode::serde::encode_to_vec(item, bincode::config::standard())
            .map_err(SerializationError::from)?;

        fs::write(&temp_path, &encoded).await?;
        fs::rename(&temp_path, &record_path).await?;

        Ok(())
    }

    async fn read_record(&self, id: &ItemId) -> crate::Result<QueueItem> {
        let contents = match fs::read(self.record_path(id)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let (item, _): (QueueItem, usize) =
            bincode::serde::decode_from_slice(&contents, bincode::config::standard())
                .map_err(SerializationError::from)?;

        Ok(item)
    }

    /// Scan the spool directory and decode every valid record
    ///
    /// Ignores temporary and tombstoned files, validates every filename
    /// through `ItemId::from_filename` (which rejects traversal patterns),
    /// and skips records that fail to decode so one corrupt file cannot
    /// poison the whole queue.
    async fn scan(&self) -> crate::Result<Vec<QueueItem>> {
        let mut entries = fs::read_dir(&self.path).await?;
        let mut items = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name();
            let filename_str = filename.to_string_lossy();

            if !filename_str.ends_with(".bin") || filename_str.starts_with(".tmp_") {
                continue;
            }

            let Some(id) = ItemId::from_filename(&filename_str) else {
                continue;
            };

            match self.read_record(&id).await {
                Ok(item) => items.push(item),
                // Raced with a concurrent delete
                Err(StoreError::NotFound(_)) => {}
                Err(StoreError::Serialization(e)) => {
                    internal!(
                        level = ERROR,
                        "Skipping corrupt record {id} in queue store: {e}"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        // ULIDs are lexicographically sortable by creation time
        items.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(items)
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    /// Write a new item to disk
    ///
    /// Uses atomic writes to ensure consistency:
    /// 1. Encode the record to bincode
    /// 2. Write it to the temporary file `.tmp_{item_id}.bin`
    /// 3. Atomically rename into place (removes the `.tmp_` prefix)
    ///
    /// If the process crashes before the rename, the temporary file is
    /// ignored by `list` and swept on the next `init()`. Only after the
    /// rename completes is the item considered durably enqueued.
    async fn put(&self, item: &QueueItem) -> crate::Result<()> {
        let record_path = self.record_path(&item.id);

        // ULID collision would mean two producers minted the same ID
        if fs::try_exists(&record_path).await.unwrap_or(false) {
            return Err(StoreError::AlreadyExists(item.id.clone()));
        }

        self.write_record(item).await?;

        internal!(
            level = DEBUG,
            "Persisted item {} to {}",
            item.id,
            record_path.display()
        );

        Ok(())
    }

    async fn get(&self, id: &ItemId) -> crate::Result<QueueItem> {
        self.read_record(id).await
    }

    /// Rewrite an existing record in place
    ///
    /// The same temp-then-rename dance as `put`; the rename atomically
    /// replaces the old record, so readers observe either the previous or
    /// the new version, never a torn write.
    async fn update(&self, item: &QueueItem) -> crate::Result<()> {
        if !fs::try_exists(self.record_path(&item.id)).await? {
            return Err(StoreError::NotFound(item.id.clone()));
        }

        self.write_record(item).await
    }

    async fn mark_delivered(&self, id: &ItemId) -> crate::Result<()> {
        let mut item = match self.read_record(id).await {
            Ok(item) => item,
            // Idempotent: already cleaned up
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        if item.delivered {
            return Ok(());
        }

        item.mark_delivered();
        self.write_record(&item).await?;

        internal!(level = DEBUG, "Marked item {id} delivered");

        Ok(())
    }

    async fn delete_delivered(&self) -> crate::Result<usize> {
        let mut removed = 0;

        for item in self.scan().await? {
            if !item.delivered {
                continue;
            }

            match self.remove(&item.id).await {
                Ok(()) => removed += 1,
                // Raced with a concurrent cleanup pass
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if removed > 0 {
            internal!(level = DEBUG, "Cleaned up {removed} delivered items");
        }

        Ok(removed)
    }

    /// Delete an item from the store
    ///
    /// Uses a two-phase delete to stay crash-safe:
    /// 1. Atomically rename the record to a `.deleted` suffix
    /// 2. Unlink the renamed file
    ///
    /// If the process crashes after phase 1, the `.deleted` file is invisible
    /// to `list` and swept on the next startup.
    async fn remove(&self, id: &ItemId) -> crate::Result<()> {
        let record_path = self.record_path(id);
        let deleted_path = self.path.join(format!("{id}.bin.deleted"));

        match fs::rename(&record_path, &deleted_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        fs::remove_file(&deleted_path).await?;

        internal!(level = DEBUG, "Removed item {id} from the queue store");

        Ok(())
    }

    async fn list_undelivered(&self) -> crate::Result<Vec<QueueItem>> {
        let mut items = self.scan().await?;
        items.retain(|item| !item.delivered);
        Ok(items)
    }

    async fn list_all(&self) -> crate::Result<Vec<QueueItem>> {
        self.scan().await
    }
}

/// Builder for `FileQueueStore`
#[derive(Debug, Default)]
pub struct FileQueueStoreBuilder {
    path: PathBuf,
}

impl FileQueueStoreBuilder {
    /// Set the spool directory path
    #[must_use]
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Build the final `FileQueueStore`
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn build(self) -> crate::Result<FileQueueStore> {
        FileQueueStore::validate_path(&self.path)?;
        Ok(FileQueueStore { path: self.path })
    }
}
