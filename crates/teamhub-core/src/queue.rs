//! Deferred-write sync queue
//!
//! Mutations that could not reach the remote store are appended here and
//! replayed in FIFO order on the next drain. The queue lives in the local
//! store so it survives restarts.

use std::collections::{HashMap, HashSet};

use serde_json::json;

use crate::config::DrainPolicy;
use crate::error::{Error, Result};
use crate::models::{Record, RecordId, RecordKind, SyncOp, SyncQueueItem};
use crate::remote::{
    insert_payload, remote_id_of, RemoteError, RemoteResult, RemoteStore, RemoteTable,
};
use crate::services::LocalStore;
use crate::util::now_millis;

/// A temporary id replaced by the id the remote store issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReconciliation {
    pub kind: RecordKind,
    pub from: RecordId,
    pub to: RecordId,
}

/// A queued op whose replay failed during a drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedReplay {
    pub seq: i64,
    pub op: SyncOp,
    pub error: String,
}

/// Outcome of one pass over the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub replayed: usize,
    pub failed: Vec<FailedReplay>,
    /// Ops dropped because their record never reached the remote store
    pub skipped: usize,
    pub reconciled: Vec<IdReconciliation>,
    /// Failed ops that were discarded instead of retained
    pub dropped: usize,
}

/// A drain stopped by a local store failure
#[derive(Debug, thiserror::Error)]
#[error("sync queue drain interrupted: {source}")]
pub struct DrainInterrupted {
    /// What was replayed before the failure
    pub report: DrainReport,
    #[source]
    pub source: Error,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Persistent FIFO of pending mutations.
#[derive(Clone)]
pub struct SyncQueue {
    store: LocalStore,
}

impl SyncQueue {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Append a mutation stamped with the current time.
    pub async fn enqueue(&self, op: SyncOp) -> Result<SyncQueueItem> {
        let item = self.store.enqueue(&op, now_millis()).await?;
        tracing::debug!("Queued {} for {} (seq {})", op.label(), op.target_id(), item.seq);
        Ok(item)
    }

    /// Queued mutations in FIFO order.
    pub async fn pending(&self) -> Result<Vec<SyncQueueItem>> {
        self.store.queued().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.queue_len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Point queued ops at a reconciled id. Returns how many changed.
    pub async fn remap(&self, from: &RecordId, to: &RecordId) -> Result<usize> {
        let mut changed = 0;
        for mut item in self.store.queued().await? {
            if item.op.remap_id(from, to) {
                self.store.rewrite_queued(item.seq, &item.op).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Replay every queued op against `remote`, oldest first.
    ///
    /// There is no retry within a pass: a failed op is logged and the loop
    /// moves on. What happens to failed ops afterwards is up to `policy`.
    /// Replayed items leave the queue one by one; if the local store fails
    /// midway the pass stops and the work done so far comes back in
    /// [`DrainInterrupted::report`].
    pub async fn drain(
        &self,
        remote: &dyn RemoteStore,
        policy: DrainPolicy,
    ) -> std::result::Result<DrainReport, DrainInterrupted> {
        let mut report = DrainReport::default();
        let items = match self.store.queued().await {
            Ok(items) => items,
            Err(source) => return Err(DrainInterrupted { report, source }),
        };
        if items.is_empty() {
            return Ok(report);
        }

        tracing::info!("Draining {} queued operations", items.len());

        if let Err(source) = self.replay_items(remote, policy, items, &mut report).await {
            tracing::error!(
                "Drain interrupted after {} replayed operations: {source}",
                report.replayed
            );
            return Err(DrainInterrupted { report, source });
        }

        tracing::info!(
            "Drain finished: {} replayed, {} failed, {} skipped",
            report.replayed,
            report.failed.len(),
            report.skipped
        );
        Ok(report)
    }

    async fn replay_items(
        &self,
        remote: &dyn RemoteStore,
        policy: DrainPolicy,
        items: Vec<SyncQueueItem>,
        report: &mut DrainReport,
    ) -> Result<()> {
        let pending_inserts = items
            .iter()
            .filter(|item| item.op.is_insert() && item.op.target_id().is_local())
            .map(|item| item.op.target_id().clone())
            .collect::<HashSet<_>>();
        let mut renames = HashMap::<RecordId, RecordId>::new();
        let mut failed_inserts = HashSet::<RecordId>::new();
        let mut retained = 0;

        for item in items {
            let mut op = item.op;
            if let Some(to) = renames.get(op.target_id()).cloned() {
                let from = op.target_id().clone();
                op.remap_id(&from, &to);
            }
            let target = op.target_id().clone();

            if target.is_local() && !op.is_insert() {
                if failed_inserts.contains(&target) {
                    report.failed.push(FailedReplay {
                        seq: item.seq,
                        op: op.clone(),
                        error: format!("waiting for {target} to reach the remote store"),
                    });
                    self.retain(policy, item.seq, &op).await?;
                    retained += 1;
                    continue;
                }
                if !pending_inserts.contains(&target) {
                    tracing::warn!(
                        "Skipping {} for {target}: record was never sent to the remote store",
                        op.label()
                    );
                    report.skipped += 1;
                    self.store.dequeue(&[item.seq]).await?;
                    continue;
                }
            }

            match replay(remote, &op).await {
                Ok(remote_id) => {
                    if let Some(remote_id) = remote_id.filter(|remote_id| *remote_id != target) {
                        renames.insert(target.clone(), remote_id.clone());
                        report.reconciled.push(IdReconciliation {
                            kind: op.kind(),
                            from: target,
                            to: remote_id,
                        });
                    }
                    report.replayed += 1;
                    self.store.dequeue(&[item.seq]).await?;
                }
                Err(error) => {
                    tracing::warn!(
                        "Failed to replay {} (seq {}): {}",
                        op.label(),
                        item.seq,
                        error
                    );
                    if op.is_insert() && target.is_local() {
                        failed_inserts.insert(target);
                    }
                    report.failed.push(FailedReplay {
                        seq: item.seq,
                        op: op.clone(),
                        error: error.to_string(),
                    });
                    self.retain(policy, item.seq, &op).await?;
                    retained += 1;
                }
            }
        }

        if policy == DrainPolicy::ClearAll {
            self.store.clear_queue().await?;
            report.dropped = retained;
            if retained > 0 {
                tracing::warn!("Discarded {retained} failed operations after drain");
            }
        }
        Ok(())
    }

    /// Keep a failed item (with its remapped op) for the next drain.
    async fn retain(&self, policy: DrainPolicy, seq: i64, op: &SyncOp) -> Result<()> {
        match policy {
            DrainPolicy::RetainFailed => self.store.mark_failed(seq, op).await,
            DrainPolicy::ClearAll => Ok(()),
        }
    }
}

/// Send one mutation to the remote store.
///
/// Returns the remote-issued id for inserts.
pub async fn replay(remote: &dyn RemoteStore, op: &SyncOp) -> RemoteResult<Option<RecordId>> {
    let table = RemoteTable::for_kind(op.kind());
    let target = op.target_id();
    if target.is_local() && !op.is_insert() {
        return Err(RemoteError::InvalidPayload(format!(
            "{target} has not reached the remote store yet"
        )));
    }

    match op {
        SyncOp::InsertFile(file) => insert_record(remote, table, file).await.map(Some),
        SyncOp::InsertMessage(message) => insert_record(remote, table, message).await.map(Some),
        SyncOp::InsertMember(member) => insert_record(remote, table, member).await.map(Some),
        SyncOp::UpdateMessage {
            id,
            content,
            edited_at,
        } => {
            let patch = json!({ "content": content, "edited_at": edited_at });
            remote.update(table, &id.to_string(), patch).await?;
            Ok(None)
        }
        SyncOp::UpdateMember { id, patch } => {
            let patch = serde_json::to_value(patch)
                .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
            remote.update(table, &id.to_string(), patch).await?;
            Ok(None)
        }
        SyncOp::DeleteFile(id) | SyncOp::DeleteMessage(id) | SyncOp::DeleteMember(id) => {
            remote.delete(table, &id.to_string()).await?;
            Ok(None)
        }
    }
}

async fn insert_record<R: Record>(
    remote: &dyn RemoteStore,
    table: RemoteTable,
    record: &R,
) -> RemoteResult<RecordId> {
    let row = remote.insert(table, insert_payload(record)?).await?;
    let id = remote_id_of(&row).ok_or_else(|| {
        RemoteError::InvalidPayload(format!("insert into {table} returned a row without id"))
    })?;
    RecordId::remote(id).map_err(|error| RemoteError::InvalidPayload(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, MemberPatch, SharedFile};
    use std::path::PathBuf;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::db::Database;
    use crate::remote::{MemoryRemote, RemoteCall, Subscription};
    use pretty_assertions::assert_eq;

    /// Drops the local queue table right after each successful insert.
    struct QueueBreakingRemote {
        inner: MemoryRemote,
        db_path: PathBuf,
    }

    #[async_trait]
    impl RemoteStore for QueueBreakingRemote {
        fn is_configured(&self) -> bool {
            true
        }

        async fn insert(&self, table: RemoteTable, row: Value) -> RemoteResult<Value> {
            let row = self.inner.insert(table, row).await?;
            let db = Database::open(&self.db_path).await.unwrap();
            db.connection()
                .execute("DROP TABLE IF EXISTS sync_queue", ())
                .await
                .unwrap();
            Ok(row)
        }

        async fn update(&self, table: RemoteTable, id: &str, patch: Value) -> RemoteResult<()> {
            self.inner.update(table, id, patch).await
        }

        async fn delete(&self, table: RemoteTable, id: &str) -> RemoteResult<()> {
            self.inner.delete(table, id).await
        }

        async fn select_all(&self, table: RemoteTable) -> RemoteResult<Vec<Value>> {
            self.inner.select_all(table).await
        }

        async fn subscribe_changes(&self, table: RemoteTable) -> RemoteResult<Subscription> {
            self.inner.subscribe_changes(table).await
        }
    }

    async fn setup() -> (SyncQueue, MemoryRemote) {
        let store = LocalStore::open_in_memory().await.unwrap();
        (SyncQueue::new(store), MemoryRemote::new())
    }

    fn file(name: &str) -> SharedFile {
        SharedFile::new(name, 1, "text/plain", "ana").unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_replays_in_fifo_order_and_empties_queue() {
        let (queue, remote) = setup().await;
        for name in ["a.txt", "b.txt", "c.txt"] {
            queue.enqueue(SyncOp::InsertFile(file(name))).await.unwrap();
        }

        let report = queue.drain(&remote, DrainPolicy::RetainFailed).await.unwrap();

        assert_eq!(report.replayed, 3);
        assert!(report.is_clean());
        assert_eq!(report.reconciled.len(), 3);
        let names = remote
            .rows(RemoteTable::SharedFiles)
            .await
            .into_iter()
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn follow_up_ops_use_the_reconciled_id() {
        let (queue, remote) = setup().await;
        let message = ChatMessage::new("ana", "draft").unwrap();
        queue
            .enqueue(SyncOp::InsertMessage(message.clone()))
            .await
            .unwrap();
        queue
            .enqueue(SyncOp::UpdateMessage {
                id: message.id.clone(),
                content: "final".to_string(),
                edited_at: 5,
            })
            .await
            .unwrap();

        let report = queue.drain(&remote, DrainPolicy::RetainFailed).await.unwrap();

        assert_eq!(report.replayed, 2);
        assert_eq!(report.reconciled[0].from, message.id);
        assert_eq!(report.reconciled[0].to, RecordId::remote("srv-1").unwrap());
        assert_eq!(
            remote.calls().await,
            vec![
                RemoteCall::Insert {
                    table: RemoteTable::ChatMessages
                },
                RemoteCall::Update {
                    table: RemoteTable::ChatMessages,
                    id: "srv-1".to_string()
                },
            ]
        );
        assert_eq!(remote.rows(RemoteTable::ChatMessages).await[0]["content"], "final");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_insert_blocks_dependent_ops_when_retained() {
        let (queue, remote) = setup().await;
        remote.fail_insert_number(1).await;
        let doc = file("a.txt");
        queue.enqueue(SyncOp::InsertFile(doc.clone())).await.unwrap();
        queue.enqueue(SyncOp::DeleteFile(doc.id.clone())).await.unwrap();

        let report = queue.drain(&remote, DrainPolicy::RetainFailed).await.unwrap();

        assert_eq!(report.replayed, 0);
        assert_eq!(report.failed.len(), 2);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|item| item.attempts == 1));
        assert_eq!(remote.calls().await.len(), 1);

        let report = queue.drain(&remote, DrainPolicy::RetainFailed).await.unwrap();
        assert_eq!(report.replayed, 2);
        assert!(queue.is_empty().await.unwrap());
        assert!(remote.rows(RemoteTable::SharedFiles).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_all_discards_failures() {
        let (queue, remote) = setup().await;
        remote.set_unreachable(true).await;
        queue.enqueue(SyncOp::InsertFile(file("a.txt"))).await.unwrap();

        let report = queue.drain(&remote, DrainPolicy::ClearAll).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn orphaned_local_ops_are_skipped() {
        let (queue, remote) = setup().await;
        queue
            .enqueue(SyncOp::UpdateMember {
                id: RecordId::new_local(),
                patch: MemberPatch::name("X"),
            })
            .await
            .unwrap();

        let report = queue.drain(&remote, DrainPolicy::RetainFailed).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(remote.calls().await.is_empty());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remap_rewrites_matching_queued_ops() {
        let (queue, _remote) = setup().await;
        let local = RecordId::new_local();
        let remote_id = RecordId::remote("srv-4").unwrap();
        queue.enqueue(SyncOp::DeleteFile(local.clone())).await.unwrap();
        queue
            .enqueue(SyncOp::DeleteFile(RecordId::remote("srv-2").unwrap()))
            .await
            .unwrap();

        assert_eq!(queue.remap(&local, &remote_id).await.unwrap(), 1);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].op, SyncOp::DeleteFile(remote_id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replay_refuses_unsent_records() {
        let remote = MemoryRemote::new();
        let result = replay(&remote, &SyncOp::DeleteMessage(RecordId::new_local())).await;
        assert!(matches!(result, Err(RemoteError::InvalidPayload(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupted_drain_keeps_replayed_work() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("queue.db");
        let queue = SyncQueue::new(LocalStore::open_path(db_path.clone()).await.unwrap());
        for name in ["a.txt", "b.txt"] {
            queue.enqueue(SyncOp::InsertFile(file(name))).await.unwrap();
        }
        let remote = QueueBreakingRemote {
            inner: MemoryRemote::new(),
            db_path,
        };

        let interrupted = queue
            .drain(&remote, DrainPolicy::RetainFailed)
            .await
            .unwrap_err();

        assert!(interrupted.source.is_storage_fault());
        assert_eq!(interrupted.report.replayed, 1);
        assert_eq!(interrupted.report.reconciled.len(), 1);
        let stored = remote.inner.rows(RemoteTable::SharedFiles).await;
        let issued = RecordId::remote(remote_id_of(&stored[0]).unwrap()).unwrap();
        assert_eq!(interrupted.report.reconciled[0].to, issued);
        assert_eq!(remote.inner.insert_calls(RemoteTable::SharedFiles).await, 1);
    }
}
