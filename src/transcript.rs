//! Streaming transcript renderer
//!
//! Each assistant reply moves through
//! `Idle → Pending → Streaming → Finalized | Failed(reason)`.
//! While streaming, the slot shows the raw buffer as escaped text; markers
//! and markdown are rendered once, when the reply is finalized. A failure
//! appends `[Error: <reason>]` to whatever arrived and finalizes that, so a
//! partial reply is never lost.
//!
//! The transcript produces [`SurfaceUpdate`]s; it never touches the
//! rendering surface directly.

use crate::engine::ControlState;
use crate::error::{ChatError, Result};
use crate::render::{render_final, render_streaming, MarkupConverter};
use crate::status::Notice;
use crate::types::{HistoryMessage, MessageId, Role};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Lifecycle of an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum StreamState {
    Idle,
    /// Request sent, no bytes yet
    Pending,
    /// Accumulating raw text
    Streaming,
    Finalized,
    Failed(String),
}

impl StreamState {
    pub fn is_live(&self) -> bool {
        matches!(self, StreamState::Pending | StreamState::Streaming)
    }
}

/// A change the rendering surface must apply
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceUpdate {
    /// Drop every rendered message
    Reset,
    /// Append a fully rendered message
    AppendMessage {
        id: MessageId,
        role: Role,
        markup: String,
    },
    /// Reply requested, nothing received yet
    Pending { id: MessageId },
    /// First chunk arrived; open an empty assistant slot
    OpenSlot { id: MessageId },
    /// Append escaped literal text to the slot
    AppendSlot { id: MessageId, text: String },
    /// Replace the slot content with final markup
    FinalizeSlot {
        id: MessageId,
        markup: String,
        failed: bool,
    },
    Status(Notice),
    Controls(ControlState),
}

/// The rendering surface the engine projects onto
pub trait TranscriptSurface: Send + Sync {
    fn apply(&self, update: SurfaceUpdate);
}

/// Surface that records every update, for tests and headless use
#[derive(Default)]
pub struct MemorySurface {
    updates: Mutex<Vec<SurfaceUpdate>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<SurfaceUpdate> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.clear();
        }
    }
}

impl TranscriptSurface for MemorySurface {
    fn apply(&self, update: SurfaceUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

/// One rendered message
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub id: MessageId,
    pub role: Role,
    /// Raw text: display string for user turns, reply buffer for assistant turns
    pub raw: String,
    /// What the surface currently shows
    pub markup: String,
    pub state: StreamState,
}

pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    converter: Arc<dyn MarkupConverter>,
}

impl Transcript {
    pub fn new(converter: Arc<dyn MarkupConverter>) -> Self {
        Self {
            entries: Vec::new(),
            converter,
        }
    }

    /// Render an outgoing message immediately
    pub fn push_user(&mut self, display: &str) -> (MessageId, SurfaceUpdate) {
        let id = MessageId::generate();
        let markup = render_final(display, self.converter.as_ref());
        self.entries.push(TranscriptEntry {
            id: id.clone(),
            role: Role::User,
            raw: display.to_string(),
            markup: markup.clone(),
            state: StreamState::Finalized,
        });
        let update = SurfaceUpdate::AppendMessage {
            id: id.clone(),
            role: Role::User,
            markup,
        };
        (id, update)
    }

    /// Idle → Pending
    pub fn begin_reply(&mut self) -> Result<(MessageId, SurfaceUpdate)> {
        if let Some(live) = self.entries.iter().find(|e| e.state.is_live()) {
            return Err(ChatError::InvalidTransition(format!(
                "reply {} is still in flight",
                live.id
            )));
        }
        let id = MessageId::generate();
        self.entries.push(TranscriptEntry {
            id: id.clone(),
            role: Role::Assistant,
            raw: String::new(),
            markup: String::new(),
            state: StreamState::Pending,
        });
        Ok((id.clone(), SurfaceUpdate::Pending { id }))
    }

    /// Pending → Streaming on the first chunk, Streaming → Streaming after
    pub fn push_chunk(&mut self, id: &MessageId, text: &str) -> Result<Vec<SurfaceUpdate>> {
        let entry = self.live_entry(id)?;
        let mut updates = Vec::with_capacity(2);

        if entry.state == StreamState::Pending {
            entry.state = StreamState::Streaming;
            updates.push(SurfaceUpdate::OpenSlot { id: id.clone() });
        }
        if !text.is_empty() {
            // Escaping is per character, so escaped chunks concatenate to
            // the escaped buffer
            let escaped = render_streaming(text);
            entry.raw.push_str(text);
            entry.markup.push_str(&escaped);
            updates.push(SurfaceUpdate::AppendSlot {
                id: id.clone(),
                text: escaped,
            });
        }
        Ok(updates)
    }

    /// Streaming → Finalized when the stream ends
    pub fn finish(&mut self, id: &MessageId) -> Result<SurfaceUpdate> {
        let converter = Arc::clone(&self.converter);
        let entry = self.live_entry(id)?;
        entry.markup = render_final(&entry.raw, converter.as_ref());
        entry.state = StreamState::Finalized;
        Ok(SurfaceUpdate::FinalizeSlot {
            id: id.clone(),
            markup: entry.markup.clone(),
            failed: false,
        })
    }

    /// Pending|Streaming → Failed, keeping any partial content
    pub fn fail(&mut self, id: &MessageId, reason: &str) -> Result<SurfaceUpdate> {
        let converter = Arc::clone(&self.converter);
        let entry = self.live_entry(id)?;
        entry.raw.push_str(&format!("[Error: {}]", reason));
        entry.markup = render_final(&entry.raw, converter.as_ref());
        entry.state = StreamState::Failed(reason.to_string());
        Ok(SurfaceUpdate::FinalizeSlot {
            id: id.clone(),
            markup: entry.markup.clone(),
            failed: true,
        })
    }

    /// Non-streaming reply: Pending → Finalized directly
    ///
    /// The reply kind is only known once the response arrives, so the
    /// surface has already seen `Pending` for this id; no `OpenSlot` or
    /// `AppendSlot` is emitted before the `FinalizeSlot`.
    pub fn complete(&mut self, id: &MessageId, reply: &str) -> Result<SurfaceUpdate> {
        let converter = Arc::clone(&self.converter);
        let entry = self.live_entry(id)?;
        if entry.state != StreamState::Pending {
            return Err(ChatError::InvalidTransition(format!(
                "reply {} already started streaming",
                id
            )));
        }
        entry.raw = reply.to_string();
        entry.markup = render_final(&entry.raw, converter.as_ref());
        entry.state = StreamState::Finalized;
        Ok(SurfaceUpdate::FinalizeSlot {
            id: id.clone(),
            markup: entry.markup.clone(),
            failed: false,
        })
    }

    /// Replace the transcript with a chat's history
    pub fn restore(&mut self, history: &[HistoryMessage]) -> Vec<SurfaceUpdate> {
        self.entries.clear();
        let mut updates = vec![SurfaceUpdate::Reset];
        for message in history {
            let id = MessageId::generate();
            let markup = render_final(&message.content, self.converter.as_ref());
            self.entries.push(TranscriptEntry {
                id: id.clone(),
                role: message.role,
                raw: message.content.clone(),
                markup: markup.clone(),
                state: StreamState::Finalized,
            });
            updates.push(SurfaceUpdate::AppendMessage {
                id,
                role: message.role,
                markup,
            });
        }
        updates
    }

    pub fn clear(&mut self) -> SurfaceUpdate {
        self.entries.clear();
        SurfaceUpdate::Reset
    }

    /// State of the reply currently in flight, `Idle` if none
    pub fn live_state(&self) -> StreamState {
        self.entries
            .iter()
            .find(|e| e.state.is_live())
            .map(|e| e.state.clone())
            .unwrap_or(StreamState::Idle)
    }

    pub fn get(&self, id: &MessageId) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    fn live_entry(&mut self, id: &MessageId) -> Result<&mut TranscriptEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| ChatError::NotFound(format!("message {}", id)))?;
        if !entry.state.is_live() {
            return Err(ChatError::InvalidTransition(format!(
                "reply {} is no longer streaming ({:?})",
                id, entry.state
            )));
        }
        Ok(entry)
    }
}
