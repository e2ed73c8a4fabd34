//! Sync orchestration: local-first reads and writes, deferred remote replay.

mod context;
mod journal;
mod orchestrator;
mod seed;
mod state;

pub use context::SyncContext;
pub use orchestrator::{
    Applied, MutationOutcome, StartReport, StatusReport, SyncOrchestrator, SyncOutcome,
    SyncReport,
};
pub use seed::seed_workspace;
pub use state::{SyncPhase, WorkspaceRecord, WorkspaceState};

#[cfg(test)]
mod tests;
