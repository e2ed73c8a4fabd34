use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio::sync::broadcast;

use super::*;
use crate::config::{DrainPolicy, SyncSettings};
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::models::{
    ChatMessage, MemberPatch, MemberRole, RecordId, SharedFile, SyncOp, TeamMember,
};
use crate::notify::{Notice, NoticeBus};
use crate::remote::{
    insert_payload, MemoryRemote, RemoteCall, RemoteChange, RemoteStore, RemoteTable,
    UnconfiguredRemote,
};
use crate::services::LocalStore;

struct Harness {
    orchestrator: Arc<SyncOrchestrator>,
    remote: Arc<MemoryRemote>,
    notices: broadcast::Receiver<Notice>,
}

impl Harness {
    fn store(&self) -> &LocalStore {
        &self.orchestrator.context().store
    }

    fn monitor(&self) -> &ConnectivityMonitor {
        &self.orchestrator.context().connectivity
    }

    async fn go_online(&self) -> Option<SyncOutcome> {
        let event = self.monitor().report(true)?;
        self.orchestrator.handle_connectivity(event).await
    }

    async fn file_names_on_remote(&self) -> Vec<String> {
        self.remote
            .rows(RemoteTable::SharedFiles)
            .await
            .into_iter()
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect()
    }

    async fn select_calls(&self) -> usize {
        self.remote
            .calls()
            .await
            .iter()
            .filter(|call| matches!(call, RemoteCall::SelectAll { .. }))
            .count()
    }
}

fn build(
    store: LocalStore,
    remote: Arc<MemoryRemote>,
    online: bool,
    drain_policy: DrainPolicy,
) -> Harness {
    let bus = NoticeBus::default();
    let notices = bus.subscribe();
    let ctx = SyncContext::new(store, remote.clone(), ConnectivityMonitor::new(online))
        .with_notifier(Arc::new(bus))
        .with_settings(SyncSettings {
            drain_policy,
            ..SyncSettings::default()
        });

    Harness {
        orchestrator: Arc::new(SyncOrchestrator::new(ctx)),
        remote,
        notices,
    }
}

async fn harness(online: bool, drain_policy: DrainPolicy) -> Harness {
    let store = LocalStore::open_in_memory().await.unwrap();
    build(store, Arc::new(MemoryRemote::new()), online, drain_policy)
}

async fn local_only(store: LocalStore) -> Arc<SyncOrchestrator> {
    let remote: Arc<dyn RemoteStore> = Arc::new(UnconfiguredRemote);
    let ctx = SyncContext::new(store, remote, ConnectivityMonitor::new(true));
    let orchestrator = Arc::new(SyncOrchestrator::new(ctx));
    orchestrator.start().await;
    orchestrator
}

fn file(name: &str) -> SharedFile {
    SharedFile::new(name, 10, "text/plain", "ana").unwrap()
}

/// Files with strictly increasing creation times
fn files(names: &[&str]) -> Vec<SharedFile> {
    names
        .iter()
        .zip(1_000..)
        .map(|(name, created_at)| SharedFile {
            created_at,
            ..file(name)
        })
        .collect()
}

async fn next_notice(notices: &mut broadcast::Receiver<Notice>) -> Notice {
    tokio::time::timeout(Duration::from_secs(5), notices.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn local_write_completes_before_remote_write() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(300)));
    let h = build(store, remote, true, DrainPolicy::RetainFailed);

    let orchestrator = h.orchestrator.clone();
    let pending = tokio::spawn(async move { orchestrator.add_file(file("plan.md")).await });

    let store = h.store().clone();
    eventually(|| {
        let store = store.clone();
        async move { store.get_all::<SharedFile>().await.unwrap().len() == 1 }
    })
    .await;
    assert!(h.remote.rows(RemoteTable::SharedFiles).await.is_empty());

    let applied = pending.await.unwrap();
    assert_eq!(applied.outcome, MutationOutcome::Synced);
    assert_eq!(h.file_names_on_remote().await, vec!["plan.md"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_inserts_replay_in_order_on_reconnect() {
    let h = harness(false, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;

    for file in files(&["a.txt", "b.txt", "c.txt"]) {
        let applied = h.orchestrator.add_file(file).await;
        assert_eq!(applied.outcome, MutationOutcome::Queued);
    }
    assert_eq!(h.orchestrator.pending_ops().await.unwrap().len(), 3);
    assert!(h.remote.calls().await.is_empty());

    let outcome = h.go_online().await.unwrap();

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected a completed sync, got {outcome:?}");
    };
    assert_eq!(report.drain.replayed, 3);
    assert_eq!(h.file_names_on_remote().await, vec!["a.txt", "b.txt", "c.txt"]);
    assert!(h.orchestrator.pending_ops().await.unwrap().is_empty());

    let stored = h.store().get_all::<SharedFile>().await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|f| !f.id.is_local()));
    assert_eq!(h.orchestrator.files().await, stored);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_all_policy_loses_failed_insert() {
    let h = harness(false, DrainPolicy::ClearAll).await;
    h.orchestrator.start().await;
    h.remote.fail_insert_number(2).await;

    for file in files(&["a.txt", "b.txt", "c.txt"]) {
        h.orchestrator.add_file(file).await;
    }
    let Some(SyncOutcome::Completed(report)) = h.go_online().await else {
        panic!("expected a completed sync");
    };

    assert_eq!(report.drain.failed.len(), 1);
    assert_eq!(report.drain.dropped, 1);
    assert!(h.orchestrator.pending_ops().await.unwrap().is_empty());
    assert_eq!(h.file_names_on_remote().await, vec!["a.txt", "c.txt"]);

    // The failed insert is gone everywhere
    let local_names = h
        .store()
        .get_all::<SharedFile>()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect::<Vec<_>>();
    assert_eq!(local_names, vec!["a.txt", "c.txt"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn retain_failed_policy_keeps_only_failed_insert() {
    let h = harness(false, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;
    h.remote.fail_insert_number(2).await;

    for file in files(&["a.txt", "b.txt", "c.txt"]) {
        h.orchestrator.add_file(file).await;
    }
    let Some(SyncOutcome::Completed(report)) = h.go_online().await else {
        panic!("expected a completed sync");
    };

    assert_eq!(report.drain.replayed, 2);
    assert_eq!(report.drain.dropped, 0);
    let pending = h.orchestrator.pending_ops().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 1);
    assert!(matches!(&pending[0].op, SyncOp::InsertFile(f) if f.name == "b.txt"));

    // The pending insert stays visible on top of the refreshed state
    let names = h
        .orchestrator
        .files()
        .await
        .into_iter()
        .map(|f| f.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    assert_eq!(h.store().get_all::<SharedFile>().await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_run_without_remote_seeds_team() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let orchestrator = local_only(store.clone()).await;

    assert_eq!(store.get_all::<TeamMember>().await.unwrap().len(), 3);
    assert_eq!(store.get_all::<ChatMessage>().await.unwrap().len(), 1);
    assert_eq!(orchestrator.members().await.len(), 3);
    assert!(store.queued().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn reopening_store_does_not_duplicate_or_reseed() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("teamhub.db");

    let first = {
        let store = LocalStore::open_path(&path).await.unwrap();
        let orchestrator = local_only(store).await;
        orchestrator.snapshot().await
    };

    let store = LocalStore::open_path(&path).await.unwrap();
    let remote: Arc<dyn RemoteStore> = Arc::new(UnconfiguredRemote);
    let ctx = SyncContext::new(store, remote, ConnectivityMonitor::new(true));
    let orchestrator = SyncOrchestrator::new(ctx);
    let report = orchestrator.start().await;

    assert!(!report.seeded);
    assert_eq!(orchestrator.snapshot().await, first);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_member_update_stays_local_until_reconnect() {
    let h = harness(true, DrainPolicy::RetainFailed).await;
    let member = TeamMember::new("Ana", "ana@example.com", MemberRole::Member).unwrap();
    let row = h
        .remote
        .seed_row(RemoteTable::TeamMembers, insert_payload(&member).unwrap())
        .await;
    h.orchestrator.start().await;

    let id = RecordId::remote(row["id"].as_str().unwrap()).unwrap();
    assert!(h.store().get::<TeamMember>(&id).await.unwrap().is_some());

    h.monitor().report(false);
    let applied = h
        .orchestrator
        .update_member(&id, MemberPatch::name("X"))
        .await
        .unwrap();

    assert_eq!(applied.outcome, MutationOutcome::Queued);
    assert_eq!(h.store().get::<TeamMember>(&id).await.unwrap().unwrap().name, "X");
    assert_eq!(h.orchestrator.members().await[0].name, "X");
    assert_eq!(h.remote.rows(RemoteTable::TeamMembers).await[0]["name"], "Ana");

    h.go_online().await;
    assert_eq!(h.remote.rows(RemoteTable::TeamMembers).await[0]["name"], "X");
    assert!(h.orchestrator.pending_ops().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn update_of_unknown_member_fails() {
    let h = harness(true, DrainPolicy::RetainFailed).await;
    let result = h
        .orchestrator
        .update_member(&RecordId::remote("srv-404").unwrap(), MemberPatch::name("X"))
        .await;
    assert!(matches!(result, Err(crate::Error::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn redundant_online_signals_trigger_one_sync() {
    let mut h = harness(false, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;
    let task = h.orchestrator.clone().run();

    h.monitor().report(true);
    h.monitor().report(true);
    h.monitor().report(true);

    let mut seen = Vec::new();
    loop {
        let notice = next_notice(&mut h.notices).await;
        let done = notice.title == "Sync complete";
        seen.push(notice.title);
        if done {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(notice) = h.notices.try_recv() {
        seen.push(notice.title);
    }
    task.abort();

    let restored = seen.iter().filter(|t| *t == "Connection restored").count();
    assert_eq!(restored, 1);
    assert_eq!(h.select_calls().await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_sync_requests_run_once() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(50)));
    let h = build(store, remote, true, DrainPolicy::RetainFailed);

    let (first, second) = tokio::join!(h.orchestrator.sync_now(), h.orchestrator.sync_now());

    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(second, SyncOutcome::AlreadyRunning);
    assert_eq!(h.select_calls().await, 3);
    assert!(!h.orchestrator.is_syncing());

    // The guard is released once the first sync finishes
    assert!(matches!(
        h.orchestrator.sync_now().await,
        SyncOutcome::Completed(_)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn online_insert_reconciles_local_id() {
    let h = harness(true, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;

    let applied = h
        .orchestrator
        .send_message("ana", "hello team")
        .await
        .unwrap();

    assert_eq!(applied.outcome, MutationOutcome::Synced);
    assert_eq!(applied.record.id, RecordId::remote("srv-1").unwrap());
    let stored = h.store().get_all::<ChatMessage>().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, applied.record.id);
    assert_eq!(h.orchestrator.messages().await, stored);
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_follow_up_ops_follow_reconciled_id() {
    let h = harness(false, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;

    let applied = h
        .orchestrator
        .add_member("Ben", "ben@example.com", MemberRole::Admin)
        .await
        .unwrap();
    h.orchestrator
        .update_member(&applied.record.id, MemberPatch::name("Benjamin"))
        .await
        .unwrap();
    assert_eq!(h.orchestrator.pending_ops().await.unwrap().len(), 2);

    h.go_online().await;

    let rows = h.remote.rows(RemoteTable::TeamMembers).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Benjamin");
    let members = h.store().get_all::<TeamMember>().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "Benjamin");
    assert!(!members[0].id.is_local());
}

#[tokio::test(flavor = "multi_thread")]
async fn pushed_changes_are_applied_once() {
    let h = harness(true, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;
    let task = h.orchestrator.clone().run();

    let remote = h.remote.clone();
    eventually(|| {
        let remote = remote.clone();
        async move {
            remote
                .calls()
                .await
                .iter()
                .filter(|call| matches!(call, RemoteCall::Subscribe { .. }))
                .count()
                == 3
        }
    })
    .await;

    let mut message = ChatMessage::new("ben", "from another device").unwrap();
    message.id = RecordId::remote("srv-99").unwrap();
    let row = serde_json::to_value(&message).unwrap();
    h.remote
        .push_external(RemoteTable::ChatMessages, RemoteChange::Insert(row.clone()))
        .await;
    h.remote
        .push_external(RemoteTable::ChatMessages, RemoteChange::Insert(row))
        .await;

    let orchestrator = h.orchestrator.clone();
    eventually(|| {
        let orchestrator = orchestrator.clone();
        async move { !orchestrator.messages().await.is_empty() }
    })
    .await;

    // Our own insert is echoed back by the feed as well
    h.orchestrator.send_message("ana", "hi").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    task.abort();

    let messages = h.orchestrator.messages().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(h.store().get_all::<ChatMessage>().await.unwrap(), messages);
}

#[tokio::test(flavor = "multi_thread")]
async fn pushed_delete_removes_record() {
    let h = harness(true, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;
    let applied = h.orchestrator.add_file(file("a.txt")).await;

    h.orchestrator
        .apply_remote_change(
            RemoteTable::SharedFiles,
            RemoteChange::Delete {
                id: applied.record.id.to_string(),
            },
        )
        .await;

    assert!(h.orchestrator.files().await.is_empty());
    assert!(h.store().get_all::<SharedFile>().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn local_only_mutations_are_not_queued() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let orchestrator = local_only(store.clone()).await;

    let applied = orchestrator.add_file(file("a.txt")).await;
    assert_eq!(applied.outcome, MutationOutcome::LocalOnly);
    assert!(store.queued().await.unwrap().is_empty());
    assert_eq!(orchestrator.sync_now().await, SyncOutcome::NotConfigured);

    let outcome = orchestrator.delete_file(&applied.record.id).await.unwrap();
    assert_eq!(outcome, MutationOutcome::LocalOnly);
    assert!(store.get_all::<SharedFile>().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn detached_store_degrades_to_memory() {
    let h = build(
        LocalStore::detached(),
        Arc::new(MemoryRemote::new()),
        false,
        DrainPolicy::RetainFailed,
    );
    let report = h.orchestrator.start().await;
    assert!(!report.local_available);

    let applied = h.orchestrator.add_file(file("a.txt")).await;
    assert_eq!(applied.outcome, MutationOutcome::MemoryOnly);
    assert_eq!(h.orchestrator.files().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn going_offline_notifies_without_remote_traffic() {
    let mut h = harness(true, DrainPolicy::RetainFailed).await;

    let event = h.monitor().report(false).unwrap();
    assert_eq!(event, ConnectivityEvent::Offline);
    assert_eq!(h.orchestrator.handle_connectivity(event).await, None);

    assert_eq!(next_notice(&mut h.notices).await.title, "Working offline");
    assert_eq!(h.orchestrator.phase(), SyncPhase::Offline);
    assert!(h.remote.calls().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_and_delete_message_while_online() {
    let h = harness(true, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;

    let sent = h.orchestrator.send_message("ana", "draft").await.unwrap();
    let edited = h
        .orchestrator
        .edit_message(&sent.record.id, "final")
        .await
        .unwrap();
    assert_eq!(edited.outcome, MutationOutcome::Synced);
    assert_eq!(
        h.remote.rows(RemoteTable::ChatMessages).await[0]["content"],
        "final"
    );

    let outcome = h.orchestrator.delete_message(&sent.record.id).await.unwrap();
    assert_eq!(outcome, MutationOutcome::Synced);
    assert!(h.remote.rows(RemoteTable::ChatMessages).await.is_empty());
    assert!(h.orchestrator.messages().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_queue_and_phase() {
    let h = harness(false, DrainPolicy::RetainFailed).await;
    h.orchestrator.start().await;
    h.orchestrator.add_file(file("a.txt")).await;

    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SyncPhase::Offline);
    assert!(!status.online);
    assert!(status.remote_configured);
    assert_eq!(status.pending_ops, 1);
    assert_eq!(status.files, 1);
    assert_eq!(status.last_sync_at, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_during_sync_survives_refresh() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(100)));
    let h = build(store, remote, true, DrainPolicy::RetainFailed);

    let orchestrator = h.orchestrator.clone();
    let sync = tokio::spawn(async move { orchestrator.sync_now().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let applied = h.orchestrator.add_file(file("race.txt")).await;
    assert_eq!(applied.outcome, MutationOutcome::Synced);
    assert!(!applied.record.id.is_local());

    let stored = h.store().get_all::<SharedFile>().await.unwrap();
    assert_eq!(stored, vec![applied.record.clone()]);
    assert_eq!(h.orchestrator.files().await, vec![applied.record.clone()]);

    assert!(matches!(sync.await.unwrap(), SyncOutcome::Completed(_)));
    assert_eq!(h.orchestrator.files().await, vec![applied.record]);
    assert_eq!(h.file_names_on_remote().await, vec!["race.txt"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_during_sync_stays_deleted() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(100)));
    let h = build(store, remote, true, DrainPolicy::RetainFailed);

    let added = h.orchestrator.add_file(file("old.txt")).await;
    assert_eq!(added.outcome, MutationOutcome::Synced);

    let orchestrator = h.orchestrator.clone();
    let sync = tokio::spawn(async move { orchestrator.sync_now().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let outcome = h.orchestrator.delete_file(&added.record.id).await.unwrap();
    assert_eq!(outcome, MutationOutcome::Synced);
    assert!(matches!(sync.await.unwrap(), SyncOutcome::Completed(_)));

    assert!(h.orchestrator.files().await.is_empty());
    assert!(h.store().get_all::<SharedFile>().await.unwrap().is_empty());
    assert!(h.file_names_on_remote().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_broken_store_as_unavailable() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("teamhub.db");
    let store = LocalStore::open_path(db_path.clone()).await.unwrap();
    let mut h = build(store, Arc::new(MemoryRemote::new()), false, DrainPolicy::RetainFailed);
    h.orchestrator.start().await;
    assert!(h.orchestrator.is_local_available());

    let db = crate::db::Database::open(&db_path).await.unwrap();
    db.connection()
        .execute("DROP TABLE sync_queue", ())
        .await
        .unwrap();

    let status = h.orchestrator.status().await;
    assert!(!status.local_available);
    assert_eq!(status.pending_ops, 0);
    assert_eq!(next_notice(&mut h.notices).await.title, "Offline storage unavailable");
}
