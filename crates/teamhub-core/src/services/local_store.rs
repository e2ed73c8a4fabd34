//! Thread-safe local persistent store shared across the sync core.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    CollectionRepository, Database, LibSqlCollection, LibSqlMetaRepository, LibSqlQueueRepository,
    MetaRepository, QueueRepository, StoredRecord,
};
use crate::error::{Error, Result};
use crate::models::{MemberPatch, RecordId, SyncOp, SyncQueueItem, TeamMember};

/// Service wrapper around the local libSQL database.
///
/// A detached store has no database behind it; every operation fails with
/// [`Error::Storage`] so callers can fall back to memory-only behavior.
#[derive(Clone)]
pub struct LocalStore {
    db: Option<Arc<Mutex<Database>>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and the open is retried
    /// once with a fresh file.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is unreadable: {}. Moving it aside and retrying once.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Some(Arc::new(Mutex::new(db))),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Some(Arc::new(Mutex::new(db))),
            db_path: None,
        })
    }

    /// A store with no backing database.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            db: None,
            db_path: None,
        }
    }

    /// Whether a database is attached.
    pub const fn is_available(&self) -> bool {
        self.db.is_some()
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn database(&self) -> Result<&Arc<Mutex<Database>>> {
        self.db
            .as_ref()
            .ok_or_else(|| Error::Storage("Local store is unavailable".to_string()))
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };

        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local store from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale local store file {}", path.display());
            }
        }

        Ok(())
    }

    /// Insert or overwrite a record.
    pub async fn put<R: StoredRecord>(&self, record: &R) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<R>::new(db.connection()).put(record).await
    }

    /// Fetch a record by id.
    pub async fn get<R: StoredRecord>(&self, id: &RecordId) -> Result<Option<R>> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<R>::new(db.connection()).get(id).await
    }

    /// Every record of a collection, oldest first.
    pub async fn get_all<R: StoredRecord>(&self) -> Result<Vec<R>> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<R>::new(db.connection()).get_all().await
    }

    /// Atomically overwrite a whole collection.
    pub async fn replace_all<R: StoredRecord>(&self, records: &[R]) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<R>::new(db.connection())
            .replace_all(records)
            .await
    }

    /// Empty a collection.
    pub async fn clear<R: StoredRecord>(&self) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<R>::new(db.connection()).clear().await
    }

    /// Move a record to its remote-issued id.
    pub async fn rename<R: StoredRecord>(&self, from: &RecordId, to: &RecordId) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<R>::new(db.connection())
            .rename(from, to)
            .await
    }

    /// Read-merge-write a member.
    pub async fn update_member(&self, id: &RecordId, patch: &MemberPatch) -> Result<TeamMember> {
        let db = self.database()?.lock().await;
        LibSqlCollection::<TeamMember>::new(db.connection())
            .update(id, patch)
            .await
    }

    /// Append a mutation to the sync queue.
    pub async fn enqueue(&self, op: &SyncOp, timestamp: i64) -> Result<SyncQueueItem> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .append(op, timestamp)
            .await
    }

    /// Queued mutations in FIFO order.
    pub async fn queued(&self) -> Result<Vec<SyncQueueItem>> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection()).list().await
    }

    /// Number of queued mutations.
    pub async fn queue_len(&self) -> Result<usize> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection()).count().await
    }

    /// Remove replayed queue items.
    pub async fn dequeue(&self, seqs: &[i64]) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .remove(seqs)
            .await
    }

    /// Keep a failed queue item for the next drain.
    pub async fn mark_failed(&self, seq: i64, op: &SyncOp) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .mark_failed(seq, op)
            .await
    }

    /// Replace a queued op in place (id reconciliation).
    pub async fn rewrite_queued(&self, seq: i64, op: &SyncOp) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .rewrite(seq, op)
            .await
    }

    /// Drop every queued mutation.
    pub async fn clear_queue(&self) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlQueueRepository::new(db.connection()).clear().await
    }

    /// Timestamp of the last completed sync.
    pub async fn last_sync_at(&self) -> Result<Option<i64>> {
        let db = self.database()?.lock().await;
        LibSqlMetaRepository::new(db.connection())
            .last_sync_at()
            .await
    }

    /// Record a completed sync.
    pub async fn set_last_sync_at(&self, timestamp: i64) -> Result<()> {
        let db = self.database()?.lock().await;
        LibSqlMetaRepository::new(db.connection())
            .set_last_sync_at(timestamp)
            .await
    }
}
