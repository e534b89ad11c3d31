//! Builds the outgoing payload and its display string from the armed context
//!
//! Only context whose plugin is enabled is included. A turn with no text and
//! no eligible context is rejected; the engine never sends an empty turn.

use crate::error::{ChatError, Result};
use crate::marker::{FileBadge, Marker};
use crate::plugins::PluginGate;
use crate::types::{Attachment, AttachmentKind, SessionAttachment};
use serde::{Deserialize, Serialize};

/// Placeholder shown when a turn carries context but no text
pub const CONTEXT_ONLY_PLACEHOLDER: &str = "(Context attached)";

/// Everything that may be armed for the next turn
#[derive(Debug, Clone, Copy)]
pub struct ContextSources<'a> {
    pub gate: &'a PluginGate,
    pub attachments: &'a [Attachment],
    pub session_file: Option<&'a SessionAttachment>,
    /// Calendar text, already filtered by the holder's `active` flag
    pub calendar_text: Option<&'a str>,
    /// Per-message web-search toggle
    pub web_search: bool,
}

/// A composed turn, ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingTurn {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub session_attachment: Option<SessionAttachment>,
    pub calendar_text: Option<String>,
    pub web_search_enabled: bool,
}

impl OutgoingTurn {
    pub fn has_context(&self) -> bool {
        !self.attachments.is_empty()
            || self.session_attachment.is_some()
            || self.calendar_text.is_some()
            || self.web_search_enabled
    }

    /// Markers for the included context, in wire order
    pub fn markers(&self) -> Vec<Marker> {
        let mut markers: Vec<Marker> = self
            .attachments
            .iter()
            .map(|a| Marker::file(&a.filename, FileBadge::from(a.kind)))
            .collect();
        if let Some(session) = &self.session_attachment {
            markers.push(Marker::file(&session.filename, FileBadge::Session));
        }
        if self.calendar_text.is_some() {
            markers.push(Marker::Calendar);
        }
        if self.web_search_enabled {
            markers.push(Marker::WebSearch);
        }
        markers
    }

    /// Marker-annotated string shown in the transcript for this turn
    pub fn display_text(&self) -> String {
        let markers = self.markers();
        let mut out: String = markers.iter().map(|m| m.to_string()).collect();
        if !markers.is_empty() {
            out.push('\n');
        }
        if self.text.trim().is_empty() {
            out.push_str(CONTEXT_ONLY_PLACEHOLDER);
        } else {
            out.push_str(&self.text);
        }
        out
    }
}

/// Compose a turn from the message text and the armed context
pub fn compose(text: &str, sources: ContextSources<'_>) -> Result<OutgoingTurn> {
    let files = sources.gate.files;
    let turn = OutgoingTurn {
        text: text.to_string(),
        attachments: if files {
            sources.attachments.to_vec()
        } else {
            Vec::new()
        },
        session_attachment: if files {
            sources.session_file.cloned()
        } else {
            None
        },
        calendar_text: if sources.gate.calendar {
            sources.calendar_text.map(str::to_string)
        } else {
            None
        },
        web_search_enabled: sources.gate.web_search && sources.web_search,
    };

    if text.trim().is_empty() && !turn.has_context() {
        return Err(ChatError::Validation(
            "Type a message or attach some context first".to_string(),
        ));
    }

    Ok(turn)
}

/// Reference to an uploaded file in the send payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFileRef {
    pub id: i64,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
}

/// Session file content in the send payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilePayload {
    pub filename: String,
    /// Base64-encoded file content
    pub content: String,
    pub mimetype: String,
}

/// Body of the message-send request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub attached_files: Vec<AttachedFileRef>,
    pub calendar_context: Option<String>,
    pub session_files: Vec<SessionFilePayload>,
    pub enable_web_search: bool,
    pub enable_streaming: bool,
}

impl ChatRequest {
    pub fn from_turn(turn: &OutgoingTurn, enable_streaming: bool) -> Self {
        Self {
            message: turn.text.clone(),
            attached_files: turn
                .attachments
                .iter()
                .map(|a| AttachedFileRef {
                    id: a.file_id,
                    filename: a.filename.clone(),
                    kind: a.kind,
                })
                .collect(),
            calendar_context: turn.calendar_text.clone(),
            session_files: turn
                .session_attachment
                .iter()
                .map(|s| SessionFilePayload {
                    filename: s.filename.clone(),
                    content: s.content_base64.clone(),
                    mimetype: s.mime_type.clone(),
                })
                .collect(),
            enable_web_search: turn.web_search_enabled,
            enable_streaming,
        }
    }
}
