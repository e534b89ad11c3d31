//! Calendar context holder
//!
//! `active` may only be true while a snapshot is loaded and the calendar
//! plugin is enabled. Every mutator re-establishes that.

use crate::error::{ChatError, Result};
use crate::plugins::{Plugin, PluginGate};
use crate::types::CalendarContext;
use chrono::Utc;

#[derive(Debug, Clone, Default)]
pub struct CalendarContextHolder {
    context: Option<CalendarContext>,
    active: bool,
}

impl CalendarContextHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot; leaves `active` unchanged
    pub fn load(&mut self, events_text: impl Into<String>) {
        let events_text = events_text.into();
        tracing::debug!(bytes = events_text.len(), "Calendar context loaded");
        self.context = Some(CalendarContext {
            events_text,
            loaded_at: Utc::now(),
        });
    }

    /// Arm or disarm the snapshot for the next message
    ///
    /// Activation fails, and `active` is forced off, unless the plugin is
    /// enabled and a snapshot is loaded.
    pub fn set_active(&mut self, flag: bool, gate: &PluginGate) -> Result<()> {
        if !flag {
            self.active = false;
            return Ok(());
        }
        if !gate.calendar {
            self.active = false;
            return Err(ChatError::PluginDisabled(Plugin::Calendar));
        }
        if self.context.is_none() {
            self.active = false;
            return Err(ChatError::Validation(
                "Load calendar events before activating them".to_string(),
            ));
        }
        self.active = true;
        Ok(())
    }

    /// Force `active` off if the invariant no longer holds
    ///
    /// Returns whether `active` was switched off.
    pub fn enforce(&mut self, gate: &PluginGate) -> bool {
        if self.active && (!gate.calendar || self.context.is_none()) {
            self.active = false;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.context = None;
        self.active = false;
    }

    pub fn context(&self) -> Option<&CalendarContext> {
        self.context.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Events text if the snapshot should ride on the next message
    pub fn armed_text(&self, gate: &PluginGate) -> Option<&str> {
        if self.active && gate.calendar {
            self.context.as_ref().map(|c| c.events_text.as_str())
        } else {
            None
        }
    }
}
