//! Data models for teamhub

mod file;
mod id;
mod member;
mod message;
mod sync_op;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use file::SharedFile;
pub use id::{LocalId, RecordId, RemoteId};
pub use member::{MemberPatch, MemberRole, MemberStatus, TeamMember};
pub use message::ChatMessage;
pub use sync_op::{SyncOp, SyncQueueItem};

/// The three kinds of domain record the sync core manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    File,
    Message,
    Member,
}

impl RecordKind {
    /// Lowercase name used in logs and notifications
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Message => "message",
            Self::Member => "member",
        }
    }
}

/// Behavior shared by every domain record kind.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Record kind discriminator
    const KIND: RecordKind;

    /// Primary key
    fn id(&self) -> &RecordId;

    /// Replace the primary key (temporary id reconciliation)
    fn set_id(&mut self, id: RecordId);

    /// Creation timestamp (Unix ms)
    fn created_at(&self) -> i64;
}
