//! Session attachment holder: one ephemeral, content-bearing file
//!
//! Loading is two-phase: [`SessionAttachmentHolder::begin_load`] validates
//! the size and hands out a [`LoadToken`], the caller encodes the bytes off
//! the event loop, then [`SessionAttachmentHolder::complete_load`] applies
//! the result. Only the most recently issued token may land; earlier
//! completions are discarded (last call wins).
//!
//! The same token identifies the stored value afterwards, so post-send
//! cleanup can tell whether the file it sent is still the one held.

use crate::error::{ChatError, Result};
use crate::types::SessionAttachment;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;

/// Monotonically increasing load generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// What the surface shows for the session file slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionFileView {
    Empty,
    /// Encoding in flight, placeholder visible
    Encoding { filename: String },
    Ready { filename: String, mime_type: String },
}

#[derive(Debug, Clone)]
struct PendingLoad {
    token: LoadToken,
    filename: String,
    mime_type: String,
}

#[derive(Debug, Clone)]
pub struct SessionAttachmentHolder {
    max_bytes: usize,
    next_token: u64,
    pending: Option<PendingLoad>,
    current: Option<(LoadToken, SessionAttachment)>,
}

impl SessionAttachmentHolder {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            next_token: 0,
            pending: None,
            current: None,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate a file and reserve a token for its encoding
    ///
    /// Oversized files are rejected and leave the holder untouched.
    pub fn begin_load(
        &mut self,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        len: usize,
    ) -> Result<LoadToken> {
        let filename = filename.into();
        if len > self.max_bytes {
            return Err(ChatError::Validation(format!(
                "{} is too large ({}); the limit is {}",
                filename,
                format_size(len),
                format_size(self.max_bytes)
            )));
        }

        self.next_token += 1;
        let token = LoadToken(self.next_token);
        self.pending = Some(PendingLoad {
            token,
            filename,
            mime_type: mime_type.into(),
        });
        Ok(token)
    }

    /// Apply the result of an encoding started by `begin_load`
    ///
    /// Returns `Ok(true)` if the value was stored, `Ok(false)` if the
    /// completion was stale. On encode failure the holder reverts to empty
    /// and the error is returned.
    pub fn complete_load(
        &mut self,
        token: LoadToken,
        encoded: std::result::Result<String, String>,
    ) -> Result<bool> {
        let pending = match self.pending.take() {
            Some(p) if p.token == token => p,
            other => {
                self.pending = other;
                tracing::debug!(token = token.0, "Stale session file completion discarded");
                return Ok(false);
            }
        };

        match encoded {
            Ok(content_base64) => {
                tracing::debug!(
                    filename = %pending.filename,
                    token = token.0,
                    "Session file ready"
                );
                self.current = Some((
                    token,
                    SessionAttachment {
                        filename: pending.filename,
                        mime_type: pending.mime_type,
                        content_base64,
                    },
                ));
                Ok(true)
            }
            Err(reason) => {
                self.current = None;
                Err(ChatError::FileRead(format!("{}: {}", pending.filename, reason)))
            }
        }
    }

    /// Empty the holder and forget any pending load
    pub fn clear(&mut self) {
        self.pending = None;
        self.current = None;
    }

    /// Clear the held value only if it is still the one loaded under `token`
    pub fn clear_if(&mut self, token: LoadToken) -> bool {
        match &self.current {
            Some((held, _)) if *held == token => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&SessionAttachment> {
        self.current.as_ref().map(|(_, a)| a)
    }

    pub fn current_token(&self) -> Option<LoadToken> {
        self.current.as_ref().map(|(t, _)| *t)
    }

    pub fn is_encoding(&self) -> bool {
        self.pending.is_some()
    }

    pub fn view(&self) -> SessionFileView {
        if let Some(p) = &self.pending {
            return SessionFileView::Encoding {
                filename: p.filename.clone(),
            };
        }
        match &self.current {
            Some((_, a)) => SessionFileView::Ready {
                filename: a.filename.clone(),
                mime_type: a.mime_type.clone(),
            },
            None => SessionFileView::Empty,
        }
    }
}

/// Base64-encode file content on the blocking pool
pub async fn encode_content(bytes: Bytes) -> std::result::Result<String, String> {
    tokio::task::spawn_blocking(move || BASE64.encode(&bytes))
        .await
        .map_err(|e| format!("encoding task failed: {}", e))
}

fn format_size(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    const KB: usize = 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
