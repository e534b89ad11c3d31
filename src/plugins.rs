//! Independently toggleable context sources

use serde::{Deserialize, Serialize};
use std::fmt;

/// A context source that can be switched on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plugin {
    /// Uploaded documents and session attachments
    Files,
    /// Calendar snapshot
    Calendar,
    /// Backend web search
    WebSearch,
}

impl Plugin {
    pub const ALL: [Plugin; 3] = [Plugin::Files, Plugin::Calendar, Plugin::WebSearch];

    /// Human-readable label used in status messages
    pub fn label(&self) -> &'static str {
        match self {
            Plugin::Files => "files",
            Plugin::Calendar => "calendar",
            Plugin::WebSearch => "web search",
        }
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Enabled flags for every plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginGate {
    pub files: bool,
    pub calendar: bool,
    pub web_search: bool,
}

impl Default for PluginGate {
    fn default() -> Self {
        Self {
            files: true,
            calendar: true,
            web_search: true,
        }
    }
}

impl PluginGate {
    pub fn is_enabled(&self, plugin: Plugin) -> bool {
        match plugin {
            Plugin::Files => self.files,
            Plugin::Calendar => self.calendar,
            Plugin::WebSearch => self.web_search,
        }
    }

    /// Set a flag, returning whether it actually changed
    pub fn set(&mut self, plugin: Plugin, enabled: bool) -> bool {
        let slot = match plugin {
            Plugin::Files => &mut self.files,
            Plugin::Calendar => &mut self.calendar,
            Plugin::WebSearch => &mut self.web_search,
        };
        let changed = *slot != enabled;
        *slot = enabled;
        changed
    }
}
