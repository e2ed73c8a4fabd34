//! Error types for teamhub-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::RemoteError;

/// Result type alias using teamhub-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in teamhub-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store is unavailable or returned inconsistent data
    #[error("Storage error: {0}")]
    Storage(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store error
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this error comes from the local persistence layer.
    pub const fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::LibSql(_) | Self::Io(_))
    }
}
