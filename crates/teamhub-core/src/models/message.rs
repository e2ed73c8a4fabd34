//! Chat message model

use serde::{Deserialize, Serialize};

use super::{Record, RecordId, RecordKind};
use crate::error::Result;
use crate::util::{now_millis, require_text};

/// A message posted to the team chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Record identifier
    pub id: RecordId,
    /// Author display name
    pub sender: String,
    /// Message body
    pub content: String,
    /// Creation timestamp (Unix ms), used for chat ordering
    pub created_at: i64,
    /// Last edit timestamp (Unix ms)
    #[serde(default)]
    pub edited_at: Option<i64>,
}

impl ChatMessage {
    /// Create a new message with a temporary local id.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: RecordId::new_local(),
            sender: require_text(sender, "Message sender")?,
            content: require_text(content, "Message content")?,
            created_at: now_millis(),
            edited_at: None,
        })
    }

    /// Return an edited copy of this message.
    pub fn edited(&self, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            content: require_text(content, "Message content")?,
            edited_at: Some(now_millis()),
            ..self.clone()
        })
    }

    /// First line of the message, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

impl Record for ChatMessage {
    const KIND: RecordKind = RecordKind::Message;

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
