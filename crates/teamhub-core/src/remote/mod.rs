//! Remote persistence contract
//!
//! The sync core talks to the remote store through [`RemoteStore`]: plain
//! CRUD on three named tables plus push notifications of changes made
//! elsewhere. Rows travel as JSON objects shaped like the record models.

mod memory;
mod postgrest;
mod realtime;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{Record, RecordId, RecordKind};

pub use memory::{MemoryRemote, RemoteCall};
pub use postgrest::PostgrestRemote;
pub use realtime::parse_change;

/// Errors returned by remote store calls
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store is not configured")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Unexpected remote payload: {0}")]
    InvalidPayload(String),
    #[error("Realtime channel error: {0}")]
    Realtime(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Remote tables backing the three record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteTable {
    ChatMessages,
    SharedFiles,
    TeamMembers,
}

impl RemoteTable {
    pub const ALL: [Self; 3] = [Self::SharedFiles, Self::ChatMessages, Self::TeamMembers];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatMessages => "chat_messages",
            Self::SharedFiles => "shared_files",
            Self::TeamMembers => "team_members",
        }
    }

    pub const fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::File => Self::SharedFiles,
            RecordKind::Message => Self::ChatMessages,
            RecordKind::Member => Self::TeamMembers,
        }
    }

    pub const fn kind(self) -> RecordKind {
        match self {
            Self::ChatMessages => RecordKind::Message,
            Self::SharedFiles => RecordKind::File,
            Self::TeamMembers => RecordKind::Member,
        }
    }
}

impl std::fmt::Display for RemoteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change pushed by the remote store
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    Insert(Value),
    Update(Value),
    Delete { id: String },
}

/// Live feed of remote changes for one table.
///
/// Dropping the subscription stops the background task feeding it.
pub struct Subscription {
    table: RemoteTable,
    rx: mpsc::UnboundedReceiver<RemoteChange>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub const fn new(table: RemoteTable, rx: mpsc::UnboundedReceiver<RemoteChange>) -> Self {
        Self {
            table,
            rx,
            task: None,
        }
    }

    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub const fn table(&self) -> RemoteTable {
        self.table
    }

    /// Next change, or `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<RemoteChange> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Remote persistence API used by the sync core.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether remote calls can be attempted at all
    fn is_configured(&self) -> bool;

    /// Insert a row and return it as stored, including the issued id
    async fn insert(&self, table: RemoteTable, row: Value) -> RemoteResult<Value>;

    /// Apply a partial update to the row with `id`
    async fn update(&self, table: RemoteTable, id: &str, patch: Value) -> RemoteResult<()>;

    /// Delete the row with `id`
    async fn delete(&self, table: RemoteTable, id: &str) -> RemoteResult<()>;

    /// Every row of a table, oldest first
    async fn select_all(&self, table: RemoteTable) -> RemoteResult<Vec<Value>>;

    /// Subscribe to changes made to a table
    async fn subscribe_changes(&self, table: RemoteTable) -> RemoteResult<Subscription>;
}

/// Remote store used when no endpoint is configured (local-only mode).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRemote;

#[async_trait]
impl RemoteStore for UnconfiguredRemote {
    fn is_configured(&self) -> bool {
        false
    }

    async fn insert(&self, _table: RemoteTable, _row: Value) -> RemoteResult<Value> {
        Err(RemoteError::NotConfigured)
    }

    async fn update(&self, _table: RemoteTable, _id: &str, _patch: Value) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete(&self, _table: RemoteTable, _id: &str) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn select_all(&self, _table: RemoteTable) -> RemoteResult<Vec<Value>> {
        Err(RemoteError::NotConfigured)
    }

    async fn subscribe_changes(&self, _table: RemoteTable) -> RemoteResult<Subscription> {
        Err(RemoteError::NotConfigured)
    }
}

/// Id of a remote row, accepting both text and numeric keys.
pub fn remote_id_of(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Convert a remote row into a record.
pub fn record_from_row<R: Record>(mut row: Value) -> RemoteResult<R> {
    let id = remote_id_of(&row)
        .ok_or_else(|| RemoteError::InvalidPayload(format!("{} row without id", R::KIND.as_str())))?;
    let id = RecordId::remote(id).map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;

    if let Some(object) = row.as_object_mut() {
        object.insert("id".to_string(), Value::String(id.to_string()));
    }
    serde_json::from_value(row).map_err(|error| {
        RemoteError::InvalidPayload(format!("invalid {} row: {error}", R::KIND.as_str()))
    })
}

/// Serialize a record for insertion; temporary local ids are left for the
/// remote store to replace.
pub fn insert_payload<R: Record>(record: &R) -> RemoteResult<Value> {
    let mut row = serde_json::to_value(record)
        .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
    if record.id().is_local() {
        if let Some(object) = row.as_object_mut() {
            object.remove("id");
        }
    }
    Ok(row)
}
