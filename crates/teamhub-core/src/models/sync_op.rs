//! Deferred mutation records

use serde::{Deserialize, Serialize};

use super::{ChatMessage, MemberPatch, RecordId, RecordKind, SharedFile, TeamMember};

/// A domain mutation that must eventually reach the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SyncOp {
    InsertFile(SharedFile),
    DeleteFile(RecordId),
    InsertMessage(ChatMessage),
    UpdateMessage {
        id: RecordId,
        content: String,
        edited_at: i64,
    },
    DeleteMessage(RecordId),
    InsertMember(TeamMember),
    UpdateMember {
        id: RecordId,
        patch: MemberPatch,
    },
    DeleteMember(RecordId),
}

impl SyncOp {
    /// Stable discriminator stored alongside the payload
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InsertFile(_) => "insert_file",
            Self::DeleteFile(_) => "delete_file",
            Self::InsertMessage(_) => "insert_message",
            Self::UpdateMessage { .. } => "update_message",
            Self::DeleteMessage(_) => "delete_message",
            Self::InsertMember(_) => "insert_member",
            Self::UpdateMember { .. } => "update_member",
            Self::DeleteMember(_) => "delete_member",
        }
    }

    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::InsertFile(_) | Self::DeleteFile(_) => RecordKind::File,
            Self::InsertMessage(_) | Self::UpdateMessage { .. } | Self::DeleteMessage(_) => {
                RecordKind::Message
            }
            Self::InsertMember(_) | Self::UpdateMember { .. } | Self::DeleteMember(_) => {
                RecordKind::Member
            }
        }
    }

    /// Id of the record this mutation targets
    pub const fn target_id(&self) -> &RecordId {
        match self {
            Self::InsertFile(file) => &file.id,
            Self::InsertMessage(message) => &message.id,
            Self::InsertMember(member) => &member.id,
            Self::DeleteFile(id)
            | Self::DeleteMessage(id)
            | Self::DeleteMember(id)
            | Self::UpdateMessage { id, .. }
            | Self::UpdateMember { id, .. } => id,
        }
    }

    pub const fn is_insert(&self) -> bool {
        matches!(
            self,
            Self::InsertFile(_) | Self::InsertMessage(_) | Self::InsertMember(_)
        )
    }

    /// Point this mutation at `to` if it currently targets `from`.
    ///
    /// Returns whether the op changed.
    pub fn remap_id(&mut self, from: &RecordId, to: &RecordId) -> bool {
        let target = match self {
            Self::InsertFile(file) => &mut file.id,
            Self::InsertMessage(message) => &mut message.id,
            Self::InsertMember(member) => &mut member.id,
            Self::DeleteFile(id)
            | Self::DeleteMessage(id)
            | Self::DeleteMember(id)
            | Self::UpdateMessage { id, .. }
            | Self::UpdateMember { id, .. } => id,
        };
        if target == from {
            target.clone_from(to);
            true
        } else {
            false
        }
    }
}

/// A queued mutation as persisted in the sync-queue collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Monotonic position in the queue (FIFO order)
    pub seq: i64,
    /// The mutation to replay
    pub op: SyncOp,
    /// Enqueue timestamp (Unix ms)
    pub timestamp: i64,
    /// Number of failed replay attempts so far
    pub attempts: u32,
}
