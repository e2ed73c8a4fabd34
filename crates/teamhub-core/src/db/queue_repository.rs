//! Sync queue repository implementation

use libsql::{Connection, Row};

use crate::error::{Error, Result};
use crate::models::{SyncOp, SyncQueueItem};

/// Trait for sync-queue storage operations (async)
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append a mutation at the tail of the queue
    async fn append(&self, op: &SyncOp, timestamp: i64) -> Result<SyncQueueItem>;

    /// Every queued item in FIFO order
    async fn list(&self) -> Result<Vec<SyncQueueItem>>;

    /// Number of queued items
    async fn count(&self) -> Result<usize>;

    /// Remove the given items
    async fn remove(&self, seqs: &[i64]) -> Result<()>;

    /// Record a failed replay and store the (possibly remapped) op
    async fn mark_failed(&self, seq: i64, op: &SyncOp) -> Result<()>;

    /// Replace the op of a queued item, keeping its position
    async fn rewrite(&self, seq: i64, op: &SyncOp) -> Result<()>;

    /// Drop every queued item
    async fn clear(&self) -> Result<()>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &Row) -> Result<SyncQueueItem> {
        let seq: i64 = row.get(0)?;
        let payload: String = row.get(1)?;
        let attempts: i64 = row.get(3)?;
        let op = serde_json::from_str::<SyncOp>(&payload).map_err(|error| {
            Error::Storage(format!("Corrupted sync queue item {seq}: {error}"))
        })?;

        Ok(SyncQueueItem {
            seq,
            op,
            timestamp: row.get(2)?,
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        })
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn append(&self, op: &SyncOp, timestamp: i64) -> Result<SyncQueueItem> {
        let payload = serde_json::to_string(op)?;
        self.conn
            .execute(
                "INSERT INTO sync_queue (op_type, payload, timestamp, attempts) VALUES (?, ?, ?, 0)",
                libsql::params![op.label(), payload, timestamp],
            )
            .await?;

        Ok(SyncQueueItem {
            seq: self.conn.last_insert_rowid(),
            op: op.clone(),
            timestamp,
            attempts: 0,
        })
    }

    async fn list(&self) -> Result<Vec<SyncQueueItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT seq, payload, timestamp, attempts FROM sync_queue ORDER BY seq ASC",
                (),
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;

        let count: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            0
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn remove(&self, seqs: &[i64]) -> Result<()> {
        for seq in seqs {
            self.conn
                .execute("DELETE FROM sync_queue WHERE seq = ?", libsql::params![*seq])
                .await?;
        }
        Ok(())
    }

    async fn mark_failed(&self, seq: i64, op: &SyncOp) -> Result<()> {
        let payload = serde_json::to_string(op)?;
        self.conn
            .execute(
                "UPDATE sync_queue SET attempts = attempts + 1, payload = ? WHERE seq = ?",
                libsql::params![payload, seq],
            )
            .await?;
        Ok(())
    }

    async fn rewrite(&self, seq: i64, op: &SyncOp) -> Result<()> {
        let payload = serde_json::to_string(op)?;
        let rows = self
            .conn
            .execute(
                "UPDATE sync_queue SET op_type = ?, payload = ? WHERE seq = ?",
                libsql::params![op.label(), payload, seq],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("sync queue item {seq}")));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM sync_queue", ()).await?;
        Ok(())
    }
}
