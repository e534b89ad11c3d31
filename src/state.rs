//! Persisted UI state
//!
//! Toggle positions and the last-open tab are kept in a flat key-value
//! store scoped to the user profile. Values are read once at startup into
//! [`UiPreferences`] and written back on every corresponding toggle.

use crate::config::EngineConfig;
use crate::error::{ChatError, Result};
use crate::plugins::{Plugin, PluginGate};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Preference keys
pub mod keys {
    use crate::plugins::Plugin;

    pub const LAST_TAB: &str = "ui.last_tab";
    pub const COLLAPSED_PREFIX: &str = "ui.collapsed.";
    pub const FILES_PLUGIN: &str = "plugins.files";
    pub const CALENDAR_PLUGIN: &str = "plugins.calendar";
    pub const WEB_SEARCH_PLUGIN: &str = "plugins.web_search";
    pub const STREAMING: &str = "chat.streaming";
    pub const CALENDAR_ACTIVE: &str = "calendar.active";

    pub fn plugin(plugin: Plugin) -> &'static str {
        match plugin {
            Plugin::Files => FILES_PLUGIN,
            Plugin::Calendar => CALENDAR_PLUGIN,
            Plugin::WebSearch => WEB_SEARCH_PLUGIN,
        }
    }

    pub fn collapsed(section: &str) -> String {
        format!("{}{}", COLLAPSED_PREFIX, section)
    }
}

/// Key-value store for UI preferences
pub trait PreferenceStore: Send + Sync {
    /// Load every stored preference
    fn load(&self) -> Result<HashMap<String, Value>>;

    /// Store a single preference
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Read a single preference
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }
}

/// JSON file-based preference store
///
/// Atomic writes via temp file + rename to prevent corruption.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, prefs: &HashMap<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(prefs)?;
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::Config(format!(
                    "Failed to create preferences directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&tmp_path, json).map_err(|e| {
            ChatError::Config(format!(
                "Failed to write preferences file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            ChatError::Config(format!(
                "Failed to rename preferences file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Result<HashMap<String, Value>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            ChatError::Config(format!(
                "Failed to read preferences file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let prefs: HashMap<String, Value> = serde_json::from_str(&json).map_err(|e| {
            ChatError::Config(format!(
                "Failed to parse preferences file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            count = prefs.len(),
            "Preferences loaded"
        );
        Ok(prefs)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut prefs = self.load()?;
        prefs.insert(key.to_string(), value);
        self.write_all(&prefs)?;
        tracing::debug!(path = %self.path.display(), key, "Preference saved");
        Ok(())
    }
}

/// In-memory preference store for testing
#[derive(Default)]
pub struct MemoryPreferenceStore {
    prefs: std::sync::RwLock<HashMap<String, Value>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<HashMap<String, Value>> {
        let prefs = self.prefs.read().map_err(|e| {
            ChatError::Config(format!("Failed to acquire preferences lock: {}", e))
        })?;
        Ok(prefs.clone())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut prefs = self.prefs.write().map_err(|e| {
            ChatError::Config(format!("Failed to acquire preferences lock: {}", e))
        })?;
        prefs.insert(key.to_string(), value);
        Ok(())
    }
}

/// Preferences read once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct UiPreferences {
    pub last_tab: Option<String>,
    pub collapsed: BTreeMap<String, bool>,
    pub plugins: PluginGate,
    pub streaming: bool,
    pub calendar_active: bool,
}

impl UiPreferences {
    /// Defaults used when nothing has been stored yet
    pub fn defaults(config: &EngineConfig) -> Self {
        Self {
            last_tab: None,
            collapsed: BTreeMap::new(),
            plugins: PluginGate::default(),
            streaming: config.streaming_default,
            calendar_active: false,
        }
    }

    /// Read preferences from a store, falling back to defaults per key
    ///
    /// Values of the wrong type are ignored with a warning.
    pub fn load(store: &dyn PreferenceStore, config: &EngineConfig) -> Result<Self> {
        let stored = store.load()?;
        let mut prefs = Self::defaults(config);

        let flag = |key: &str| -> Option<bool> {
            let value = stored.get(key)?;
            let parsed = value.as_bool();
            if parsed.is_none() {
                tracing::warn!(key, value = %value, "Ignoring non-boolean preference");
            }
            parsed
        };

        for plugin in Plugin::ALL {
            if let Some(enabled) = flag(keys::plugin(plugin)) {
                prefs.plugins.set(plugin, enabled);
            }
        }
        if let Some(streaming) = flag(keys::STREAMING) {
            prefs.streaming = streaming;
        }
        if let Some(active) = flag(keys::CALENDAR_ACTIVE) {
            prefs.calendar_active = active;
        }
        prefs.last_tab = stored
            .get(keys::LAST_TAB)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        for (key, value) in &stored {
            if let (Some(section), Some(flag)) =
                (key.strip_prefix(keys::COLLAPSED_PREFIX), value.as_bool())
            {
                prefs.collapsed.insert(section.to_string(), flag);
            }
        }

        Ok(prefs)
    }
}
