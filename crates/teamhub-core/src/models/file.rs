//! Shared file model

use serde::{Deserialize, Serialize};

use super::{Record, RecordId, RecordKind};
use crate::error::{Error, Result};
use crate::util::{normalize_text_option, now_millis, require_text};

/// Metadata of a file shared with the team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFile {
    /// Record identifier
    pub id: RecordId,
    /// Display file name
    pub name: String,
    /// File size in bytes
    pub size_bytes: i64,
    /// Content MIME type
    pub mime_type: String,
    /// Member name or email of the uploader
    pub uploaded_by: String,
    /// Download location once the blob is stored remotely
    #[serde(default)]
    pub url: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl SharedFile {
    /// Create a new file record with a temporary local id.
    pub fn new(
        name: impl Into<String>,
        size_bytes: i64,
        mime_type: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Result<Self> {
        let name = require_text(name, "File name")?;
        let mime_type = require_text(mime_type, "File mime_type")?;
        let uploaded_by = require_text(uploaded_by, "File uploaded_by")?;
        if size_bytes < 0 {
            return Err(Error::InvalidInput(
                "File size_bytes cannot be negative".to_string(),
            ));
        }

        Ok(Self {
            id: RecordId::new_local(),
            name,
            size_bytes,
            mime_type,
            uploaded_by,
            url: None,
            created_at: now_millis(),
        })
    }

    /// Attach a download URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = normalize_text_option(Some(url.into()));
        self
    }
}

impl Record for SharedFile {
    const KIND: RecordKind = RecordKind::File;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_new() {
        let file = SharedFile::new(" roadmap.pdf ", 2048, "application/pdf", "ana").unwrap();
        assert_eq!(file.name, "roadmap.pdf");
        assert_eq!(file.size_bytes, 2048);
        assert!(file.id.is_local());
        assert!(file.url.is_none());
        assert!(file.created_at > 0);
    }

    #[test]
    fn test_file_validation() {
        assert!(SharedFile::new("", 1, "text/plain", "ana").is_err());
        assert!(SharedFile::new("a.txt", 1, "", "ana").is_err());
        assert!(SharedFile::new("a.txt", 1, "text/plain", " ").is_err());
        assert!(SharedFile::new("a.txt", -1, "text/plain", "ana").is_err());
    }

    #[test]
    fn test_with_url_ignores_blank() {
        let file = SharedFile::new("a.txt", 1, "text/plain", "ana")
            .unwrap()
            .with_url("  ");
        assert!(file.url.is_none());
    }
}
