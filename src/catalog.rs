//! Catalog of previously uploaded files

use crate::types::CatalogEntry;

/// Files known to the session, replaced wholesale on every fetch
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Replace all entries with a fresh fetch result
    pub fn replace(&mut self, entries: Vec<CatalogEntry>) {
        tracing::debug!(count = entries.len(), "Catalog replaced");
        self.entries = entries;
    }

    pub fn get(&self, id: i64) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
