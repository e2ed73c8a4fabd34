use std::io;

use teamhub_core::config::ConfigError;
use teamhub_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] teamhub_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No message content provided")]
    EmptyContent,
    #[error("Record ID cannot be empty")]
    EmptyId,
    #[error("No {kind} found for id/prefix: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Nothing to update; pass at least one of --name, --email, --role, --status")]
    EmptyUpdate,
    #[error(
        "Sync is not configured. Set TEAMHUB_SUPABASE_URL and TEAMHUB_SUPABASE_ANON_KEY, or add a remote to the config profile."
    )]
    SyncNotConfigured,
    #[error("Cannot sync while offline")]
    Offline,
}
