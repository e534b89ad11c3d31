//! Catalog rows currently checked in the file browser
//!
//! A selection carries no attachment kind. Kinds are decided later by
//! [`AttachmentComposer::commit`](crate::attachments::AttachmentComposer::commit).

use crate::catalog::Catalog;
use crate::error::{ChatError, Result};
use crate::plugins::{Plugin, PluginGate};
use serde::{Deserialize, Serialize};

/// A checked catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub id: i64,
    pub filename: String,
    pub has_summary: bool,
}

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Checked,
    Unchecked,
}

/// Enabled state of the "attach as full" / "attach as summary" controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachControls {
    pub full: bool,
    pub summary: bool,
}

/// Checked catalog entries, in the order they were checked
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: Vec<SelectedFile>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check or uncheck a catalog entry
    pub fn toggle(&mut self, id: i64, catalog: &Catalog, gate: &PluginGate) -> Result<Toggle> {
        if !gate.files {
            return Err(ChatError::PluginDisabled(Plugin::Files));
        }

        if self.remove(id) {
            return Ok(Toggle::Unchecked);
        }

        let entry = catalog
            .get(id)
            .ok_or_else(|| ChatError::NotFound(format!("File {} is not in the catalog", id)))?;
        self.selected.push(SelectedFile {
            id: entry.id,
            filename: entry.filename.clone(),
            has_summary: entry.has_summary,
        });
        Ok(Toggle::Checked)
    }

    /// Uncheck an entry, returning whether it was checked
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s.id != id);
        self.selected.len() != before
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop entries whose ids vanished from a re-fetched catalog
    ///
    /// Returns the pruned ids.
    pub fn prune(&mut self, catalog: &Catalog) -> Vec<i64> {
        let stale: Vec<i64> = self
            .selected
            .iter()
            .filter(|s| !catalog.contains(s.id))
            .map(|s| s.id)
            .collect();
        if !stale.is_empty() {
            self.selected.retain(|s| catalog.contains(s.id));
            tracing::debug!(pruned = ?stale, "Stale selections pruned");
        }
        stale
    }

    pub fn is_checked(&self, id: i64) -> bool {
        self.selected.iter().any(|s| s.id == id)
    }

    pub fn selected(&self) -> &[SelectedFile] {
        &self.selected
    }

    pub fn ids(&self) -> Vec<i64> {
        self.selected.iter().map(|s| s.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Derive the enabled state of the attach controls
    pub fn controls(&self) -> AttachControls {
        AttachControls {
            full: !self.selected.is_empty(),
            summary: self.selected.iter().any(|s| s.has_summary),
        }
    }
}
