//! teamhub-core - Offline-first sync core for teamhub
//!
//! This crate contains the shared record models, the local persistent store,
//! the deferred-write sync queue, the remote store contract and the
//! orchestrator that reconciles them. Hosts (the CLI, UI shells) drive it
//! through [`sync::SyncOrchestrator`].

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod queue;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{ChatMessage, RecordId, SharedFile, SyncOp, TeamMember};
pub use sync::{SyncContext, SyncOrchestrator};
