//! Core data types for the a3s-chat engine
//!
//! Wire-facing types use snake_case JSON to match the chat backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A previously uploaded file known to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Backend-assigned file id
    pub id: i64,

    /// Original file name
    pub filename: String,

    /// MIME type reported by the backend
    pub mime_type: String,

    /// Whether a summary has been generated for this file
    #[serde(default)]
    pub has_summary: bool,

    /// Upload time
    pub uploaded_at: DateTime<Utc>,
}

/// How an uploaded file rides on the next message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Full document text
    Full,
    /// Generated summary only
    Summary,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Full => "full",
            AttachmentKind::Summary => "summary",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reference to an uploaded file, armed for the next turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: i64,
    pub filename: String,
    pub kind: AttachmentKind,
}

/// One-shot, content-bearing file read from local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAttachment {
    pub filename: String,
    pub mime_type: String,
    pub content_base64: String,
}

/// Loaded calendar snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarContext {
    /// Pre-formatted event listing sent verbatim to the backend
    pub events_text: String,

    /// When the snapshot was loaded
    pub loaded_at: DateTime<Utc>,
}

/// Identifier of a chat conversation on the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a rendered transcript message (msg-<uuid>)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(format!("msg-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A prior turn returned by the chat history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,

    /// Raw message text, including any UI markers
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_deserialize() {
        let json = r#"{
            "id": 7,
            "filename": "q3-report.pdf",
            "mime_type": "application/pdf",
            "has_summary": true,
            "uploaded_at": "2024-05-01T10:00:00Z"
        }"#;

        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 7);
        assert_eq!(entry.filename, "q3-report.pdf");
        assert!(entry.has_summary);
    }

    #[test]
    fn test_catalog_entry_summary_defaults_false() {
        let json = r#"{
            "id": 1,
            "filename": "notes.txt",
            "mime_type": "text/plain",
            "uploaded_at": "2024-05-01T10:00:00Z"
        }"#;

        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.has_summary);
    }

    #[test]
    fn test_attachment_kind_wire_names() {
        assert_eq!(serde_json::to_string(&AttachmentKind::Full).unwrap(), "\"full\"");
        assert_eq!(
            serde_json::to_string(&AttachmentKind::Summary).unwrap(),
            "\"summary\""
        );
        assert_eq!(AttachmentKind::Summary.to_string(), "summary");
    }

    #[test]
    fn test_message_id_prefix() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert!(a.as_str().starts_with("msg-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_history_message_without_timestamp() {
        let json = r#"{"role": "assistant", "content": "Hi"}"#;
        let msg: HistoryMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.created_at.is_none());

        let out = serde_json::to_string(&msg).unwrap();
        assert!(!out.contains("created_at"));
    }
}
