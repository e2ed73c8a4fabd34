//! Row mapping for the record collections

use libsql::{Row, Value};

use crate::error::{Error, Result};
use crate::models::{ChatMessage, Record, RecordId, SharedFile, TeamMember};

/// A record kind that lives in its own local table.
///
/// `COLUMNS` starts with the primary key; `to_values` yields values in the
/// same order.
pub trait StoredRecord: Record {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn to_values(&self) -> Vec<Value>;

    fn from_row(row: &Row) -> Result<Self>;
}

impl StoredRecord for SharedFile {
    const TABLE: &'static str = "files";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "size_bytes",
        "mime_type",
        "uploaded_by",
        "url",
        "created_at",
    ];

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.name.clone()),
            Value::Integer(self.size_bytes),
            Value::Text(self.mime_type.clone()),
            Value::Text(self.uploaded_by.clone()),
            optional_text_value(self.url.as_deref()),
            Value::Integer(self.created_at),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: parse_id(row)?,
            name: row.get(1)?,
            size_bytes: row.get(2)?,
            mime_type: row.get(3)?,
            uploaded_by: row.get(4)?,
            url: optional_text(row, 5)?,
            created_at: row.get(6)?,
        })
    }
}

impl StoredRecord for ChatMessage {
    const TABLE: &'static str = "messages";
    const COLUMNS: &'static [&'static str] = &["id", "sender", "content", "created_at", "edited_at"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.sender.clone()),
            Value::Text(self.content.clone()),
            Value::Integer(self.created_at),
            self.edited_at.map_or(Value::Null, Value::Integer),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: parse_id(row)?,
            sender: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            edited_at: optional_integer(row, 4)?,
        })
    }
}

impl StoredRecord for TeamMember {
    const TABLE: &'static str = "members";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "email", "role", "status", "created_at"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.name.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.role.as_str().to_string()),
            Value::Text(self.status.as_str().to_string()),
            Value::Integer(self.created_at),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        let role: String = row.get(3)?;
        let status: String = row.get(4)?;
        Ok(Self {
            id: parse_id(row)?,
            name: row.get(1)?,
            email: row.get(2)?,
            role: role.parse()?,
            status: status.parse()?,
            created_at: row.get(5)?,
        })
    }
}

fn parse_id(row: &Row) -> Result<RecordId> {
    let id: String = row.get(0)?;
    id.parse()
        .map_err(|_| Error::Storage(format!("Corrupted record id in local store: {id}")))
}

fn optional_text_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |value| Value::Text(value.to_string()))
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Storage(format!(
            "Expected text in column {idx}, found {other:?}"
        ))),
    }
}

fn optional_integer(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Storage(format!(
            "Expected integer in column {idx}, found {other:?}"
        ))),
    }
}
