//! Record collection repository

use std::marker::PhantomData;

use libsql::params::Params;
use libsql::Connection;

use super::records::StoredRecord;
use crate::error::{Error, Result};
use crate::models::{MemberPatch, RecordId, TeamMember};

/// Trait for per-collection storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CollectionRepository<R> {
    /// Insert or overwrite a record by primary key
    async fn put(&self, record: &R) -> Result<()>;

    /// Get a record by id
    async fn get(&self, id: &RecordId) -> Result<Option<R>>;

    /// Every record, oldest first
    async fn get_all(&self) -> Result<Vec<R>>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    /// Atomically overwrite the whole collection
    async fn replace_all(&self, records: &[R]) -> Result<()>;

    /// Move a record to a new primary key
    async fn rename(&self, from: &RecordId, to: &RecordId) -> Result<()>;
}

/// libSQL implementation of `CollectionRepository`
pub struct LibSqlCollection<'a, R> {
    conn: &'a Connection,
    _record: PhantomData<R>,
}

impl<'a, R: StoredRecord> LibSqlCollection<'a, R> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            _record: PhantomData,
        }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT {} FROM {} {filter}",
            R::COLUMNS.join(", "),
            R::TABLE
        )
    }

    fn upsert_sql() -> String {
        let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
        format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
            R::TABLE,
            R::COLUMNS.join(", ")
        )
    }

    async fn write_all(&self, records: &[R]) -> Result<()> {
        let clear_sql = format!("DELETE FROM {}", R::TABLE);
        self.conn.execute(&clear_sql, ()).await?;

        let sql = Self::upsert_sql();
        for record in records {
            self.conn
                .execute(&sql, Params::Positional(record.to_values()))
                .await?;
        }
        Ok(())
    }
}

impl<R: StoredRecord> CollectionRepository<R> for LibSqlCollection<'_, R> {
    async fn put(&self, record: &R) -> Result<()> {
        self.conn
            .execute(&Self::upsert_sql(), Params::Positional(record.to_values()))
            .await?;
        Ok(())
    }

    async fn get(&self, id: &RecordId) -> Result<Option<R>> {
        let mut rows = self
            .conn
            .query(&Self::select_sql("WHERE id = ?"), [id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(R::from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<R>> {
        let mut rows = self
            .conn
            .query(&Self::select_sql("ORDER BY created_at ASC, rowid ASC"), ())
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(R::from_row(&row)?);
        }
        Ok(records)
    }

    async fn clear(&self) -> Result<()> {
        let sql = format!("DELETE FROM {}", R::TABLE);
        self.conn.execute(&sql, ()).await?;
        Ok(())
    }

    async fn replace_all(&self, records: &[R]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(e) = self.write_all(records).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn rename(&self, from: &RecordId, to: &RecordId) -> Result<()> {
        if from == to {
            return Ok(());
        }

        // A pushed copy of the remote record may already be stored under `to`
        if self.get(to).await?.is_some() {
            let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
            self.conn.execute(&sql, [from.to_string()]).await?;
            return Ok(());
        }

        let sql = format!("UPDATE {} SET id = ? WHERE id = ?", R::TABLE);
        let rows = self
            .conn
            .execute(&sql, [to.to_string(), from.to_string()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(from.to_string()));
        }
        Ok(())
    }
}

impl LibSqlCollection<'_, TeamMember> {
    /// Read-merge-write a partial member update
    pub async fn update(&self, id: &RecordId, patch: &MemberPatch) -> Result<TeamMember> {
        let mut member = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        patch.apply_to(&mut member);
        self.put(&member).await?;
        Ok(member)
    }
}
