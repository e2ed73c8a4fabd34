//! First-run demo workspace

use crate::error::Result;
use crate::models::{ChatMessage, MemberRole, TeamMember};

use super::state::WorkspaceState;

const WELCOME_SENDER: &str = "TeamHub";
const WELCOME_MESSAGE: &str =
    "Welcome to TeamHub! Share files, chat and manage your team, even while offline.";

/// Default team used when a device starts with no data and no remote store.
pub fn seed_workspace() -> Result<WorkspaceState> {
    let members = vec![
        TeamMember::new("Alex Morgan", "alex@teamhub.local", MemberRole::Owner)?,
        TeamMember::new("Sam Rivera", "sam@teamhub.local", MemberRole::Admin)?,
        TeamMember::new("Jordan Lee", "jordan@teamhub.local", MemberRole::Member)?,
    ];
    let welcome = ChatMessage::new(WELCOME_SENDER, WELCOME_MESSAGE)?;

    Ok(WorkspaceState {
        files: Vec::new(),
        messages: vec![welcome],
        members,
    })
}
