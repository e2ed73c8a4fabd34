//! In-memory workspace state served to hosts

use crate::db::StoredRecord;
use crate::models::{ChatMessage, Record, RecordId, SharedFile, SyncOp, TeamMember};

/// Lifecycle phase of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Bootstrapping,
    LoadedLocal,
    Online,
    Offline,
    Syncing,
}

impl SyncPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::LoadedLocal => "loaded-local",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Syncing => "syncing",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three record collections as currently known to this device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceState {
    pub files: Vec<SharedFile>,
    pub messages: Vec<ChatMessage>,
    pub members: Vec<TeamMember>,
}

/// A record kind with a collection in [`WorkspaceState`]
pub trait WorkspaceRecord: StoredRecord {
    fn collection(state: &WorkspaceState) -> &[Self];

    fn collection_mut(state: &mut WorkspaceState) -> &mut Vec<Self>;
}

impl WorkspaceRecord for SharedFile {
    fn collection(state: &WorkspaceState) -> &[Self] {
        &state.files
    }

    fn collection_mut(state: &mut WorkspaceState) -> &mut Vec<Self> {
        &mut state.files
    }
}

impl WorkspaceRecord for ChatMessage {
    fn collection(state: &WorkspaceState) -> &[Self] {
        &state.messages
    }

    fn collection_mut(state: &mut WorkspaceState) -> &mut Vec<Self> {
        &mut state.messages
    }
}

impl WorkspaceRecord for TeamMember {
    fn collection(state: &WorkspaceState) -> &[Self] {
        &state.members
    }

    fn collection_mut(state: &mut WorkspaceState) -> &mut Vec<Self> {
        &mut state.members
    }
}

impl WorkspaceState {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.messages.is_empty() && self.members.is_empty()
    }

    pub fn records<R: WorkspaceRecord>(&self) -> &[R] {
        R::collection(self)
    }

    pub fn find<R: WorkspaceRecord>(&self, id: &RecordId) -> Option<&R> {
        R::collection(self).iter().find(|record| record.id() == id)
    }

    pub fn contains<R: WorkspaceRecord>(&self, id: &RecordId) -> bool {
        self.find::<R>(id).is_some()
    }

    /// Replace a whole collection.
    pub fn set_records<R: WorkspaceRecord>(&mut self, mut records: Vec<R>) {
        records.sort_by_key(Record::created_at);
        *R::collection_mut(self) = records;
    }

    /// Insert or overwrite by id.
    pub fn upsert<R: WorkspaceRecord>(&mut self, record: R) {
        let records = R::collection_mut(self);
        if let Some(existing) = records.iter_mut().find(|r| r.id() == record.id()) {
            *existing = record;
        } else {
            records.push(record);
            records.sort_by_key(Record::created_at);
        }
    }

    /// Insert unless a record with the same id is already present.
    pub fn insert_if_absent<R: WorkspaceRecord>(&mut self, record: R) -> bool {
        if self.contains::<R>(record.id()) {
            return false;
        }
        self.upsert(record);
        true
    }

    pub fn remove<R: WorkspaceRecord>(&mut self, id: &RecordId) -> bool {
        let records = R::collection_mut(self);
        let before = records.len();
        records.retain(|record| record.id() != id);
        records.len() != before
    }

    /// Move a record to its remote id, dropping the local copy if the remote
    /// copy already arrived.
    pub fn rename<R: WorkspaceRecord>(&mut self, from: &RecordId, to: &RecordId) {
        if from == to {
            return;
        }
        if self.contains::<R>(to) {
            self.remove::<R>(from);
        } else if let Some(record) = R::collection_mut(self)
            .iter_mut()
            .find(|record| record.id() == from)
        {
            record.set_id(to.clone());
        }
    }

    /// Apply a mutation to the in-memory collections.
    pub fn apply(&mut self, op: &SyncOp) {
        match op {
            SyncOp::InsertFile(file) => self.upsert(file.clone()),
            SyncOp::InsertMessage(message) => self.upsert(message.clone()),
            SyncOp::InsertMember(member) => self.upsert(member.clone()),
            SyncOp::DeleteFile(id) => {
                self.remove::<SharedFile>(id);
            }
            SyncOp::DeleteMessage(id) => {
                self.remove::<ChatMessage>(id);
            }
            SyncOp::DeleteMember(id) => {
                self.remove::<TeamMember>(id);
            }
            SyncOp::UpdateMessage {
                id,
                content,
                edited_at,
            } => {
                if let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) {
                    message.content.clone_from(content);
                    message.edited_at = Some(*edited_at);
                }
            }
            SyncOp::UpdateMember { id, patch } => {
                if let Some(member) = self.members.iter_mut().find(|m| &m.id == id) {
                    patch.apply_to(member);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberPatch, MemberRole};
    use pretty_assertions::assert_eq;

    #[test]
    fn upsert_keeps_creation_order() {
        let mut state = WorkspaceState::default();
        let mut late = ChatMessage::new("ana", "late").unwrap();
        late.created_at = 20;
        let mut early = ChatMessage::new("ana", "early").unwrap();
        early.created_at = 10;

        state.upsert(late);
        state.upsert(early);

        let contents = state
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["early", "late"]);
    }

    #[test]
    fn insert_if_absent_deduplicates() {
        let mut state = WorkspaceState::default();
        let file = SharedFile::new("a.txt", 1, "text/plain", "ana").unwrap();

        assert!(state.insert_if_absent(file.clone()));
        assert!(!state.insert_if_absent(file));
        assert_eq!(state.files.len(), 1);
    }

    #[test]
    fn rename_drops_local_copy_when_remote_present() {
        let mut state = WorkspaceState::default();
        let local = SharedFile::new("a.txt", 1, "text/plain", "ana").unwrap();
        let mut remote = local.clone();
        remote.id = RecordId::remote("srv-1").unwrap();
        state.upsert(local.clone());
        state.upsert(remote.clone());

        state.rename::<SharedFile>(&local.id, &remote.id);
        assert_eq!(state.files, vec![remote]);
    }

    #[test]
    fn rename_moves_record() {
        let mut state = WorkspaceState::default();
        let member = TeamMember::new("Ana", "ana@example.com", MemberRole::Admin).unwrap();
        state.upsert(member.clone());

        let to = RecordId::remote("srv-5").unwrap();
        state.rename::<TeamMember>(&member.id, &to);
        assert!(state.contains::<TeamMember>(&to));
        assert!(!state.contains::<TeamMember>(&member.id));
    }

    #[test]
    fn apply_updates_and_deletes() {
        let mut state = WorkspaceState::default();
        let member = TeamMember::new("Ana", "ana@example.com", MemberRole::Member).unwrap();
        let message = ChatMessage::new("ana", "draft").unwrap();
        state.apply(&SyncOp::InsertMember(member.clone()));
        state.apply(&SyncOp::InsertMessage(message.clone()));

        state.apply(&SyncOp::UpdateMember {
            id: member.id.clone(),
            patch: MemberPatch::name("X"),
        });
        state.apply(&SyncOp::UpdateMessage {
            id: message.id.clone(),
            content: "final".to_string(),
            edited_at: 9,
        });
        assert_eq!(state.members[0].name, "X");
        assert_eq!(state.messages[0].content, "final");
        assert_eq!(state.messages[0].edited_at, Some(9));

        state.apply(&SyncOp::DeleteMember(member.id));
        assert!(state.members.is_empty());
        assert!(!state.is_empty());
    }
}
