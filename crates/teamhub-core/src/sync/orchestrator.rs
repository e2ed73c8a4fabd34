//! Sync orchestrator
//!
//! Every mutation is written to the local store first, then sent to the
//! remote store directly when online or appended to the sync queue
//! otherwise. Reconnecting drains the queue and refreshes local state from
//! the remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::context::SyncContext;
use super::journal::Journal;
use super::seed::seed_workspace;
use super::state::{SyncPhase, WorkspaceRecord, WorkspaceState};
use crate::config::DrainPolicy;
use crate::connectivity::ConnectivityEvent;
use crate::error::{Error, Result};
use crate::models::{
    ChatMessage, MemberPatch, MemberRole, RecordId, RecordKind, SharedFile, SyncOp,
    SyncQueueItem, TeamMember,
};
use crate::notify::Notice;
use crate::queue::{replay, DrainReport};
use crate::remote::{record_from_row, RemoteChange, RemoteTable, Subscription};
use crate::util::now_millis;

type ChangeFeed = SelectAll<BoxStream<'static, (RemoteTable, RemoteChange)>>;

/// Where a mutation ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Written to the remote store
    Synced,
    /// Stored in the sync queue for the next drain
    Queued,
    /// No remote store configured; nothing to sync
    LocalOnly,
    /// Neither the remote store nor the queue accepted it; kept in memory only
    MemoryOnly,
}

/// A mutated record together with its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    pub record: T,
    pub outcome: MutationOutcome,
}

/// Result of a completed sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub drain: DrainReport,
    /// Collections refreshed from the remote store
    pub refreshed: Vec<RemoteTable>,
    pub fetch_errors: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.drain.is_clean() && self.fetch_errors.is_empty()
    }
}

/// Result of a sync request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NotConfigured,
    Offline,
    AlreadyRunning,
    Completed(SyncReport),
}

/// What happened during [`SyncOrchestrator::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub local_available: bool,
    pub seeded: bool,
    pub initial_sync: Option<SyncOutcome>,
}

/// Snapshot for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub phase: SyncPhase,
    pub online: bool,
    pub remote_configured: bool,
    pub local_available: bool,
    pub pending_ops: usize,
    pub last_sync_at: Option<i64>,
    pub files: usize,
    pub messages: usize,
    pub members: usize,
}

struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Control loop reconciling the local store, the queue and the remote store.
pub struct SyncOrchestrator {
    ctx: SyncContext,
    /// Guards the in-memory collections and the matching local store writes
    state: RwLock<WorkspaceState>,
    journal: Mutex<Journal>,
    phase: watch::Sender<SyncPhase>,
    sync_in_progress: AtomicBool,
    local_available: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(ctx: SyncContext) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Bootstrapping);
        let local_available = ctx.store.is_available();
        Self {
            ctx,
            state: RwLock::new(WorkspaceState::default()),
            journal: Mutex::new(Journal::default()),
            phase,
            sync_in_progress: AtomicBool::new(false),
            local_available: AtomicBool::new(local_available),
        }
    }

    pub const fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn is_local_available(&self) -> bool {
        self.local_available.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_in_progress.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> WorkspaceState {
        self.state.read().await.clone()
    }

    pub async fn files(&self) -> Vec<SharedFile> {
        self.state.read().await.files.clone()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    pub async fn members(&self) -> Vec<TeamMember> {
        self.state.read().await.members.clone()
    }

    /// Mutations waiting in the sync queue
    pub async fn pending_ops(&self) -> Result<Vec<SyncQueueItem>> {
        self.ctx.queue.pending().await
    }

    pub async fn status(&self) -> StatusReport {
        let mut pending_ops = 0;
        let mut last_sync_at = None;
        if self.is_local_available() {
            match self.ctx.queue.len().await {
                Ok(len) => pending_ops = len,
                Err(error) => self.storage_fault("count queued changes", &error),
            }
            match self.ctx.store.last_sync_at().await {
                Ok(timestamp) => last_sync_at = timestamp,
                Err(error) => self.storage_fault("read the last sync time", &error),
            }
        }
        let state = self.state.read().await;

        StatusReport {
            phase: self.phase(),
            online: self.ctx.connectivity.is_online(),
            remote_configured: self.ctx.remote.is_configured(),
            local_available: self.is_local_available(),
            pending_ops,
            last_sync_at,
            files: state.files.len(),
            messages: state.messages.len(),
            members: state.members.len(),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::info!("Sync phase: {previous} -> {phase}");
        }
    }

    fn settle_phase(&self) {
        if self.ctx.connectivity.is_online() {
            self.set_phase(SyncPhase::Online);
        } else {
            self.set_phase(SyncPhase::Offline);
        }
    }

    fn notify(&self, notice: Notice) {
        self.ctx.notifier.notify(notice);
    }

    /// Record a local storage failure; the session continues from memory.
    fn storage_fault(&self, action: &str, error: &Error) {
        if !error.is_storage_fault() {
            tracing::warn!("Local store failed to {action}: {error}");
            return;
        }
        if self.local_available.swap(false, Ordering::AcqRel) {
            tracing::error!("Local store failed to {action}: {error}. Continuing in memory.");
            self.notify(
                Notice::warning("Offline storage unavailable")
                    .with_description("Changes are kept in memory until the app closes"),
            );
        }
    }

    /// Load local data, seed a first-run workspace, then sync if possible.
    pub async fn start(&self) -> StartReport {
        self.set_phase(SyncPhase::Bootstrapping);
        let loaded = self.load_local().await;
        *self.state.write().await = loaded;
        self.set_phase(SyncPhase::LoadedLocal);

        let seeded = self.seed_if_empty().await;
        self.settle_phase();

        let initial_sync =
            if self.ctx.remote.is_configured() && self.ctx.connectivity.is_online() {
                Some(self.sync_now().await)
            } else {
                None
            };

        StartReport {
            local_available: self.is_local_available(),
            seeded,
            initial_sync,
        }
    }

    async fn load_local(&self) -> WorkspaceState {
        if !self.is_local_available() {
            return WorkspaceState::default();
        }

        let loaded = async {
            Ok::<_, Error>(WorkspaceState {
                files: self.ctx.store.get_all::<SharedFile>().await?,
                messages: self.ctx.store.get_all::<ChatMessage>().await?,
                members: self.ctx.store.get_all::<TeamMember>().await?,
            })
        }
        .await;

        match loaded {
            Ok(state) => {
                tracing::info!(
                    "Loaded {} files, {} messages, {} members from local store",
                    state.files.len(),
                    state.messages.len(),
                    state.members.len()
                );
                state
            }
            Err(error) => {
                self.storage_fault("load", &error);
                WorkspaceState::default()
            }
        }
    }

    async fn seed_if_empty(&self) -> bool {
        if !self.ctx.settings.seed_on_first_run || self.ctx.remote.is_configured() {
            return false;
        }
        if !self.state.read().await.is_empty() {
            return false;
        }

        let seed = match seed_workspace() {
            Ok(seed) => seed,
            Err(error) => {
                tracing::warn!("Failed to build first-run workspace: {error}");
                return false;
            }
        };

        for member in &seed.members {
            self.persist_put(member).await;
        }
        for message in &seed.messages {
            self.persist_put(message).await;
        }
        *self.state.write().await = seed;
        tracing::info!("Seeded first-run workspace");
        true
    }

    /// Drive the orchestrator from connectivity events and remote pushes.
    ///
    /// Runs until the returned task is aborted.
    pub fn run(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.ctx.connectivity.subscribe();

        tokio::spawn(async move {
            let mut feed = self.open_change_feed().await;

            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                self.handle_connectivity(event).await;
                                if event.is_online() && feed.is_empty() {
                                    feed = self.open_change_feed().await;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                tracing::warn!("Missed {skipped} connectivity events");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    Some((table, change)) = feed.next(), if !feed.is_empty() => {
                        self.apply_remote_change(table, change).await;
                    }
                }
            }

            tracing::debug!("Sync orchestrator loop stopped");
        })
    }

    async fn open_change_feed(&self) -> ChangeFeed {
        let mut subscriptions = Vec::new();
        if self.ctx.remote.is_configured() && self.ctx.connectivity.is_online() {
            for table in RemoteTable::ALL {
                match self.ctx.remote.subscribe_changes(table).await {
                    Ok(subscription) => subscriptions.push(subscription),
                    Err(error) => {
                        tracing::warn!("Failed to subscribe to {table} changes: {error}");
                    }
                }
            }
        }
        change_feed(subscriptions)
    }

    /// React to a connectivity edge.
    pub async fn handle_connectivity(&self, event: ConnectivityEvent) -> Option<SyncOutcome> {
        match event {
            ConnectivityEvent::Online => {
                self.settle_phase();
                self.notify(
                    Notice::success("Connection restored").with_description("Syncing your changes"),
                );
                Some(self.sync_now().await)
            }
            ConnectivityEvent::Offline => {
                self.settle_phase();
                self.notify(
                    Notice::warning("Working offline")
                        .with_description("Changes are saved locally and will sync later"),
                );
                None
            }
        }
    }

    /// Drain the queue and refresh local state from the remote store.
    ///
    /// Overlapping calls return [`SyncOutcome::AlreadyRunning`].
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.ctx.remote.is_configured() {
            return SyncOutcome::NotConfigured;
        }
        if !self.ctx.connectivity.is_online() {
            return SyncOutcome::Offline;
        }
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync already in progress");
            return SyncOutcome::AlreadyRunning;
        }
        let _guard = FlagGuard(&self.sync_in_progress);

        self.set_phase(SyncPhase::Syncing);
        self.journal.lock().await.begin_sync();
        let report = self.run_sync().await;
        self.journal.lock().await.end_sync();
        self.settle_phase();
        self.notify_sync_result(&report);

        SyncOutcome::Completed(report)
    }

    async fn run_sync(&self) -> SyncReport {
        let mut report = SyncReport::default();

        if self.is_local_available() {
            match self
                .ctx
                .queue
                .drain(self.ctx.remote.as_ref(), self.ctx.settings.drain_policy)
                .await
            {
                Ok(drain) => report.drain = drain,
                Err(interrupted) => {
                    report.drain = interrupted.report;
                    self.storage_fault("drain the sync queue", &interrupted.source);
                }
            }
        }

        for reconciliation in report.drain.reconciled.clone() {
            self.rename_everywhere(reconciliation.kind, &reconciliation.from, &reconciliation.to)
                .await;
        }

        self.refresh::<SharedFile>(&mut report).await;
        self.refresh::<ChatMessage>(&mut report).await;
        self.refresh::<TeamMember>(&mut report).await;

        if self.is_local_available() {
            if let Err(error) = self.ctx.store.set_last_sync_at(now_millis()).await {
                self.storage_fault("record the sync time", &error);
            }
        }
        report
    }

    /// Overwrite one collection with the remote rows, then re-apply still
    /// queued mutations so pending local edits stay visible.
    async fn refresh<R: WorkspaceRecord>(&self, report: &mut SyncReport) {
        let table = RemoteTable::for_kind(R::KIND);
        let rows = match self.ctx.remote.select_all(table).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!("Failed to fetch {table}: {error}");
                report.fetch_errors.push(format!("{table}: {error}"));
                return;
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match record_from_row::<R>(row) {
                Ok(record) => records.push(record),
                Err(error) => tracing::warn!("Skipping invalid {table} row: {error}"),
            }
        }

        let pending = if self.is_local_available() {
            self.ctx.queue.pending().await.unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut state = self.state.write().await;
        state.set_records(records);
        for item in pending.iter().filter(|item| item.op.kind() == R::KIND) {
            state.apply(&item.op);
        }
        for op in self.journal.lock().await.ops(R::KIND) {
            state.apply(op);
        }
        self.persist_records(state.records::<R>()).await;
        report.refreshed.push(table);
    }

    fn notify_sync_result(&self, report: &SyncReport) {
        let failed = report.drain.failed.len();
        if failed > 0 {
            match self.ctx.settings.drain_policy {
                DrainPolicy::RetainFailed => self.notify(
                    Notice::warning("Sync incomplete")
                        .with_description(format!("{failed} changes will retry on the next sync")),
                ),
                DrainPolicy::ClearAll => self.notify(
                    Notice::error("Some changes could not be synced")
                        .with_description(format!("{failed} queued changes were discarded")),
                ),
            }
        } else if !report.fetch_errors.is_empty() {
            self.notify(
                Notice::warning("Could not refresh from server")
                    .with_description("Showing locally saved data"),
            );
        } else {
            self.notify(Notice::success("Sync complete"));
        }
    }

    /// Apply a change pushed by the remote store.
    pub async fn apply_remote_change(&self, table: RemoteTable, change: RemoteChange) {
        let result = match table.kind() {
            RecordKind::File => self.apply_change::<SharedFile>(change).await,
            RecordKind::Message => self.apply_change::<ChatMessage>(change).await,
            RecordKind::Member => self.apply_change::<TeamMember>(change).await,
        };
        if let Err(error) = result {
            tracing::warn!("Ignoring remote change on {table}: {error}");
        }
    }

    async fn apply_change<R: WorkspaceRecord>(&self, change: RemoteChange) -> Result<()> {
        match change {
            RemoteChange::Insert(row) => {
                let record = record_from_row::<R>(row)?;
                let mut state = self.state.write().await;
                if state.insert_if_absent(record.clone()) {
                    self.persist_put(&record).await;
                }
            }
            RemoteChange::Update(row) => {
                let record = record_from_row::<R>(row)?;
                let mut state = self.state.write().await;
                self.persist_put(&record).await;
                state.upsert(record);
            }
            RemoteChange::Delete { id } => {
                let id = RecordId::remote(id)?;
                let mut state = self.state.write().await;
                if state.remove::<R>(&id) {
                    self.persist_records(state.records::<R>()).await;
                }
            }
        }
        Ok(())
    }

    async fn persist_put<R: WorkspaceRecord>(&self, record: &R) {
        if !self.is_local_available() {
            return;
        }
        if let Err(error) = self.ctx.store.put(record).await {
            self.storage_fault("save a record", &error);
        }
    }

    async fn persist_records<R: WorkspaceRecord>(&self, records: &[R]) {
        if !self.is_local_available() {
            return;
        }
        if let Err(error) = self.ctx.store.replace_all(records).await {
            self.storage_fault("save a collection", &error);
        }
    }

    async fn rename_everywhere(&self, kind: RecordKind, from: &RecordId, to: &RecordId) {
        match kind {
            RecordKind::File => self.rename_record::<SharedFile>(from, to).await,
            RecordKind::Message => self.rename_record::<ChatMessage>(from, to).await,
            RecordKind::Member => self.rename_record::<TeamMember>(from, to).await,
        }
    }

    async fn rename_record<R: WorkspaceRecord>(&self, from: &RecordId, to: &RecordId) {
        let mut state = self.state.write().await;
        state.rename::<R>(from, to);
        self.journal.lock().await.remap(from, to);
        if !self.is_local_available() {
            return;
        }

        match self.ctx.store.rename::<R>(from, to).await {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(error) => self.storage_fault("rename a record", &error),
        }
        if let Err(error) = self.ctx.queue.remap(from, to).await {
            self.storage_fault("update queued changes", &error);
        }
        tracing::debug!("Reconciled {} {from} -> {to}", R::KIND.as_str());
    }

    /// Re-apply a finished mutation in case a refresh overwrote it while its
    /// remote write was in flight, then release its journal entry.
    async fn settle<R: WorkspaceRecord>(&self, ticket: u64, op: SyncOp) {
        let mut state = self.state.write().await;
        let id = op.target_id().clone();
        let present_before = state.contains::<R>(&id);
        state.apply(&op);
        match state.find::<R>(&id) {
            Some(record) => self.persist_put(record).await,
            None if present_before => self.persist_records(state.records::<R>()).await,
            None => {}
        }
        self.journal.lock().await.settle(ticket, op);
    }

    /// Send a mutation to the remote store, falling back to the queue.
    ///
    /// Returns the outcome and, for inserts, the remote-issued id.
    async fn dispatch(&self, op: SyncOp) -> (MutationOutcome, Option<RecordId>) {
        if !self.ctx.remote.is_configured() {
            return (MutationOutcome::LocalOnly, None);
        }

        let target = op.target_id().clone();
        let sendable = op.is_insert() || !target.is_local();
        if sendable && self.ctx.connectivity.is_online() {
            match replay(self.ctx.remote.as_ref(), &op).await {
                Ok(Some(remote_id)) => {
                    self.rename_everywhere(op.kind(), &target, &remote_id).await;
                    return (MutationOutcome::Synced, Some(remote_id));
                }
                Ok(None) => return (MutationOutcome::Synced, None),
                Err(error) => {
                    tracing::warn!("Remote write of {} failed, queueing: {error}", op.label());
                }
            }
        }

        if !self.is_local_available() {
            return (MutationOutcome::MemoryOnly, None);
        }
        match self.ctx.queue.enqueue(op).await {
            Ok(_) => {
                self.notify(
                    Notice::info("Saved locally")
                        .with_description("Will sync when the connection is back"),
                );
                (MutationOutcome::Queued, None)
            }
            Err(error) => {
                self.storage_fault("queue a change", &error);
                (MutationOutcome::MemoryOnly, None)
            }
        }
    }

    /// Write `record` to memory and the local store and open its journal
    /// entry under one state lock.
    async fn write_local<R: WorkspaceRecord>(&self, record: &R, op: SyncOp) -> u64 {
        let mut state = self.state.write().await;
        let ticket = self.journal.lock().await.open(op);
        self.persist_put(record).await;
        state.upsert(record.clone());
        ticket
    }

    async fn insert<R: WorkspaceRecord>(
        &self,
        mut record: R,
        op: fn(R) -> SyncOp,
    ) -> Applied<R> {
        let ticket = self.write_local(&record, op(record.clone())).await;

        let (outcome, remote_id) = self.dispatch(op(record.clone())).await;
        if let Some(remote_id) = remote_id {
            record.set_id(remote_id);
        }
        self.settle::<R>(ticket, op(record.clone())).await;
        Applied { record, outcome }
    }

    async fn delete<R: WorkspaceRecord>(
        &self,
        id: &RecordId,
        op: fn(RecordId) -> SyncOp,
    ) -> Result<MutationOutcome> {
        let ticket = {
            let mut state = self.state.write().await;
            if !state.remove::<R>(id) {
                return Err(Error::NotFound(id.to_string()));
            }
            let ticket = self.journal.lock().await.open(op(id.clone()));
            self.persist_records(state.records::<R>()).await;
            ticket
        };

        let (outcome, _) = self.dispatch(op(id.clone())).await;
        self.settle::<R>(ticket, op(id.clone())).await;
        Ok(outcome)
    }

    /// Share a file.
    pub async fn add_file(&self, file: SharedFile) -> Applied<SharedFile> {
        self.insert(file, SyncOp::InsertFile).await
    }

    pub async fn delete_file(&self, id: &RecordId) -> Result<MutationOutcome> {
        self.delete::<SharedFile>(id, SyncOp::DeleteFile).await
    }

    /// Post a chat message.
    pub async fn send_message(
        &self,
        sender: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Applied<ChatMessage>> {
        let message = ChatMessage::new(sender, content)?;
        Ok(self.insert(message, SyncOp::InsertMessage).await)
    }

    pub async fn edit_message(
        &self,
        id: &RecordId,
        content: impl Into<String>,
    ) -> Result<Applied<ChatMessage>> {
        let edited = self
            .state
            .read()
            .await
            .find::<ChatMessage>(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?
            .edited(content)?;

        let op = SyncOp::UpdateMessage {
            id: id.clone(),
            content: edited.content.clone(),
            edited_at: edited.edited_at.unwrap_or_else(now_millis),
        };
        let ticket = self.write_local(&edited, op.clone()).await;

        let (outcome, _) = self.dispatch(op.clone()).await;
        self.settle::<ChatMessage>(ticket, op).await;
        Ok(Applied {
            record: edited,
            outcome,
        })
    }

    pub async fn delete_message(&self, id: &RecordId) -> Result<MutationOutcome> {
        self.delete::<ChatMessage>(id, SyncOp::DeleteMessage).await
    }

    /// Add a member to the team.
    pub async fn add_member(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        role: MemberRole,
    ) -> Result<Applied<TeamMember>> {
        let member = TeamMember::new(name, email, role)?;
        Ok(self.insert(member, SyncOp::InsertMember).await)
    }

    /// Apply a partial update to a member.
    pub async fn update_member(
        &self,
        id: &RecordId,
        patch: MemberPatch,
    ) -> Result<Applied<TeamMember>> {
        let patch = patch.normalized()?;
        let mut updated = self
            .state
            .read()
            .await
            .find::<TeamMember>(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        patch.apply_to(&mut updated);

        let op = SyncOp::UpdateMember {
            id: id.clone(),
            patch: patch.clone(),
        };
        let ticket = {
            let mut state = self.state.write().await;
            let ticket = self.journal.lock().await.open(op.clone());
            if self.is_local_available() {
                match self.ctx.store.update_member(id, &patch).await {
                    Ok(_) => {}
                    Err(Error::NotFound(_)) => self.persist_put(&updated).await,
                    Err(error) => self.storage_fault("update a member", &error),
                }
            }
            state.upsert(updated.clone());
            ticket
        };

        let (outcome, _) = self.dispatch(op.clone()).await;
        self.settle::<TeamMember>(ticket, op).await;
        Ok(Applied {
            record: updated,
            outcome,
        })
    }

    pub async fn remove_member(&self, id: &RecordId) -> Result<MutationOutcome> {
        self.delete::<TeamMember>(id, SyncOp::DeleteMember).await
    }
}

fn change_feed(subscriptions: Vec<Subscription>) -> ChangeFeed {
    stream::select_all(subscriptions.into_iter().map(|subscription| {
        stream::unfold(subscription, |mut subscription| async move {
            let change = subscription.recv().await?;
            Some(((subscription.table(), change), subscription))
        })
        .boxed()
    }))
}
