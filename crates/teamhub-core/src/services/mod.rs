//! Shared services used by hosts and the orchestrator

mod local_store;

pub use local_store::LocalStore;
