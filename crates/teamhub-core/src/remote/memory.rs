//! In-process remote store
//!
//! Behaves like the hosted store for the sync core (issued ids, change
//! feeds) and records every call, so tests can assert on remote traffic.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use super::{
    remote_id_of, RemoteChange, RemoteError, RemoteResult, RemoteStore, RemoteTable, Subscription,
};

/// A call received by [`MemoryRemote`], successful or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Insert { table: RemoteTable },
    Update { table: RemoteTable, id: String },
    Delete { table: RemoteTable, id: String },
    SelectAll { table: RemoteTable },
    Subscribe { table: RemoteTable },
}

#[derive(Default)]
struct State {
    tables: HashMap<RemoteTable, Vec<Value>>,
    next_id: u64,
    calls: Vec<RemoteCall>,
    insert_attempts: usize,
    failing_inserts: HashSet<usize>,
    unreachable: bool,
    subscribers: HashMap<RemoteTable, Vec<mpsc::UnboundedSender<RemoteChange>>>,
}

impl State {
    fn check_reachable(&self) -> RemoteResult<()> {
        if self.unreachable {
            Err(RemoteError::Api {
                status: 503,
                message: "remote store unreachable".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn issue_id(&mut self) -> String {
        self.next_id += 1;
        format!("srv-{}", self.next_id)
    }

    fn broadcast(&mut self, table: RemoteTable, change: &RemoteChange) {
        if let Some(senders) = self.subscribers.get_mut(&table) {
            senders.retain(|tx| tx.send(change.clone()).is_ok());
        }
    }

    fn apply(&mut self, table: RemoteTable, change: &RemoteChange) {
        let rows = self.tables.entry(table).or_default();
        match change {
            RemoteChange::Insert(row) => rows.push(row.clone()),
            RemoteChange::Update(row) => {
                let id = remote_id_of(row);
                if let Some(existing) = rows.iter_mut().find(|r| remote_id_of(r) == id) {
                    merge(existing, row);
                }
            }
            RemoteChange::Delete { id } => {
                rows.retain(|row| remote_id_of(row).as_deref() != Some(id.as_str()));
            }
        }
    }
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// In-memory [`RemoteStore`] with failure injection and artificial latency.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the `n`th insert attempt (1-based, counted from creation) fail.
    pub async fn fail_insert_number(&self, n: usize) {
        self.state.lock().await.failing_inserts.insert(n);
    }

    /// Make every call fail until reset.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    /// Calls received so far
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of insert calls received for `table`
    pub async fn insert_calls(&self, table: RemoteTable) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| matches!(call, RemoteCall::Insert { table: t } if *t == table))
            .count()
    }

    /// Rows currently stored in `table`
    pub async fn rows(&self, table: RemoteTable) -> Vec<Value> {
        self.state
            .lock()
            .await
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a row directly, issuing an id when it has none. Not logged.
    pub async fn seed_row(&self, table: RemoteTable, mut row: Value) -> Value {
        let mut state = self.state.lock().await;
        if remote_id_of(&row).is_none() {
            let id = state.issue_id();
            if let Some(object) = row.as_object_mut() {
                object.insert("id".to_string(), Value::String(id));
            }
        }
        state.tables.entry(table).or_default().push(row.clone());
        row
    }

    /// Simulate a change made by another client and push it to subscribers.
    pub async fn push_external(&self, table: RemoteTable, change: RemoteChange) {
        let mut state = self.state.lock().await;
        state.apply(table, &change);
        state.broadcast(table, &change);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn is_configured(&self) -> bool {
        true
    }

    async fn insert(&self, table: RemoteTable, mut row: Value) -> RemoteResult<Value> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.calls.push(RemoteCall::Insert { table });
        state.insert_attempts += 1;
        state.check_reachable()?;

        let attempt = state.insert_attempts;
        if state.failing_inserts.contains(&attempt) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("injected failure for insert #{attempt}"),
            });
        }

        let Some(object) = row.as_object_mut() else {
            return Err(RemoteError::InvalidPayload(
                "insert row must be an object".to_string(),
            ));
        };
        if !object.contains_key("id") {
            let id = state.issue_id();
            object.insert("id".to_string(), Value::String(id));
        }

        let change = RemoteChange::Insert(row.clone());
        state.apply(table, &change);
        state.broadcast(table, &change);
        Ok(row)
    }

    async fn update(&self, table: RemoteTable, id: &str, mut patch: Value) -> RemoteResult<()> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.calls.push(RemoteCall::Update {
            table,
            id: id.to_string(),
        });
        state.check_reachable()?;

        if let Some(object) = patch.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        let exists = state
            .tables
            .get(&table)
            .is_some_and(|rows| rows.iter().any(|row| remote_id_of(row).as_deref() == Some(id)));
        if !exists {
            // PostgREST reports success for filters matching no rows
            return Ok(());
        }

        state.apply(table, &RemoteChange::Update(patch));
        let updated = state.tables.get(&table).and_then(|rows| {
            rows.iter()
                .find(|row| remote_id_of(row).as_deref() == Some(id))
                .cloned()
        });
        if let Some(row) = updated {
            state.broadcast(table, &RemoteChange::Update(row));
        }
        Ok(())
    }

    async fn delete(&self, table: RemoteTable, id: &str) -> RemoteResult<()> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.calls.push(RemoteCall::Delete {
            table,
            id: id.to_string(),
        });
        state.check_reachable()?;

        let change = RemoteChange::Delete { id: id.to_string() };
        state.apply(table, &change);
        state.broadcast(table, &change);
        Ok(())
    }

    async fn select_all(&self, table: RemoteTable) -> RemoteResult<Vec<Value>> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.calls.push(RemoteCall::SelectAll { table });
        state.check_reachable()?;

        Ok(state.tables.get(&table).cloned().unwrap_or_default())
    }

    async fn subscribe_changes(&self, table: RemoteTable) -> RemoteResult<Subscription> {
        let mut state = self.state.lock().await;
        state.calls.push(RemoteCall::Subscribe { table });
        state.check_reachable()?;

        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.entry(table).or_default().push(tx);
        Ok(Subscription::new(table, rx))
    }
}
