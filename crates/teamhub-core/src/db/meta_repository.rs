//! Sync bookkeeping repository

use crate::error::Result;
use libsql::Connection;

const LAST_SYNC_AT: &str = "last_sync_at";

/// Trait for sync bookkeeping values (async)
#[allow(async_fn_in_trait)]
pub trait MetaRepository {
    /// Timestamp (Unix ms) of the last completed sync
    async fn last_sync_at(&self) -> Result<Option<i64>>;

    /// Record a completed sync
    async fn set_last_sync_at(&self, timestamp: i64) -> Result<()>;
}

/// libSQL implementation of `MetaRepository`
pub struct LibSqlMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_meta WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

impl MetaRepository for LibSqlMetaRepository<'_> {
    async fn last_sync_at(&self) -> Result<Option<i64>> {
        Ok(self
            .get_value(LAST_SYNC_AT)
            .await?
            .and_then(|value| value.parse().ok()))
    }

    async fn set_last_sync_at(&self, timestamp: i64) -> Result<()> {
        self.set_value(LAST_SYNC_AT, &timestamp.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_last_sync_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlMetaRepository::new(db.connection());

        assert_eq!(repo.last_sync_at().await.unwrap(), None);
        repo.set_last_sync_at(1_700_000_000_000).await.unwrap();
        assert_eq!(repo.last_sync_at().await.unwrap(), Some(1_700_000_000_000));
    }
}
