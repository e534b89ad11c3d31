//! Typed attachments armed for the next turn
//!
//! Holds at most one attachment per file id. Committing a kind for an
//! already attached file replaces the previous entry.

use crate::error::{ChatError, Result};
use crate::plugins::{Plugin, PluginGate};
use crate::selection::SelectionTracker;
use crate::types::{Attachment, AttachmentKind};

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Number of attachments inserted or replaced
    pub attached: usize,

    /// Files attached as summaries that have none on the backend
    pub without_summary: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentComposer {
    attachments: Vec<Attachment>,
}

impl AttachmentComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach every selected file with the given kind
    ///
    /// Selections stay checked so the same files can be re-committed
    /// under the other kind.
    pub fn commit(
        &mut self,
        kind: AttachmentKind,
        selection: &SelectionTracker,
        gate: &PluginGate,
    ) -> Result<CommitReport> {
        if !gate.files {
            return Err(ChatError::PluginDisabled(Plugin::Files));
        }
        if selection.is_empty() {
            return Err(ChatError::Validation("No files selected".to_string()));
        }

        let mut without_summary = Vec::new();
        for file in selection.selected() {
            if kind == AttachmentKind::Summary && !file.has_summary {
                without_summary.push(file.filename.clone());
            }
            self.attachments.retain(|a| a.file_id != file.id);
            self.attachments.push(Attachment {
                file_id: file.id,
                filename: file.filename.clone(),
                kind,
            });
        }

        let attached = selection.len();
        tracing::debug!(
            kind = %kind,
            attached,
            without_summary = without_summary.len(),
            "Attachments committed"
        );

        Ok(CommitReport {
            attached,
            without_summary,
        })
    }

    /// Remove the attachment for a file and uncheck its selection
    ///
    /// Returns whether an attachment was removed.
    pub fn remove(&mut self, file_id: i64, selection: &mut SelectionTracker) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|a| a.file_id != file_id);
        selection.remove(file_id);
        self.attachments.len() != before
    }

    /// Drop the attachment for a file without touching the selection
    pub(crate) fn detach(&mut self, file_id: i64) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|a| a.file_id != file_id);
        self.attachments.len() != before
    }

    pub fn clear_all(&mut self) {
        self.attachments.clear();
    }

    pub fn get(&self, file_id: i64) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.file_id == file_id)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }
}
