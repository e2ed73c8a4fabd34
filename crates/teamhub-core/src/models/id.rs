//! Record identity
//!
//! A record created on this device starts with a [`LocalId`]. Once the remote
//! store accepts the insert it issues a [`RemoteId`], and the local id is
//! renamed everywhere it is referenced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

const LOCAL_PREFIX: &str = "local-";

/// Temporary identifier generated on this device, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LOCAL_PREFIX}{}", self.0)
    }
}

/// Identifier issued by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteId(String);

impl RemoteId {
    /// Wrap a remote-issued identifier.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(Error::InvalidInput("Remote id cannot be empty".to_string()));
        }
        if value.starts_with(LOCAL_PREFIX) {
            return Err(Error::InvalidInput(format!(
                "Remote id cannot use the local prefix: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a domain record, either still local or already remote
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordId {
    /// Not yet acknowledged by the remote store
    Local(LocalId),
    /// Issued by the remote store
    Remote(RemoteId),
}

impl RecordId {
    /// Generate a fresh local id.
    #[must_use]
    pub fn new_local() -> Self {
        Self::Local(LocalId::new())
    }

    /// Wrap a remote-issued id.
    pub fn remote(value: impl Into<String>) -> Result<Self> {
        RemoteId::new(value).map(Self::Remote)
    }

    /// Whether this id still needs reconciliation with the remote store.
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => id.fmt(f),
            Self::Remote(id) => id.fmt(f),
        }
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(uuid) = s.strip_prefix(LOCAL_PREFIX) {
            let uuid = Uuid::parse_str(uuid)
                .map_err(|error| Error::InvalidInput(format!("Invalid local id {s}: {error}")))?;
            return Ok(Self::Local(LocalId(uuid)));
        }
        Self::remote(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.to_string()
    }
}
