//! Engine state and the command reducer
//!
//! All context state lives in one [`Engine`]. User input, fetch results and
//! encoder completions arrive as [`Command`]s and go through
//! [`Engine::apply`], which mutates the state, posts status notices, and
//! returns the [`Effect`]s the caller has to carry out. Every command leaves
//! selections and attachments mutually consistent: an attached file is
//! always checked.
//!
//! Sending is split in two so the caller can await the transport between
//! [`Engine::begin_send`] and [`Engine::finish_send`]. The busy flag set by
//! the first is released by the second on every outcome.

use crate::attachments::AttachmentComposer;
use crate::calendar::CalendarContextHolder;
use crate::catalog::Catalog;
use crate::compose::{self, ChatRequest, ContextSources};
use crate::config::EngineConfig;
use crate::error::{ChatError, Result};
use crate::plugins::{Plugin, PluginGate};
use crate::selection::{AttachControls, SelectionTracker, Toggle};
use crate::session_file::{LoadToken, SessionAttachmentHolder, SessionFileView};
use crate::state::{keys, UiPreferences};
use crate::status::{Notice, StatusBoard};
use crate::types::{Attachment, AttachmentKind, CatalogEntry, ChatId};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

/// Input to the reducer
#[derive(Debug, Clone)]
pub enum Command {
    SetPlugin { plugin: Plugin, enabled: bool },
    /// Per-message web-search toggle
    SetWebSearch(bool),
    SetStreaming(bool),
    CatalogLoaded(Vec<CatalogEntry>),
    ToggleSelection(i64),
    CommitAttachments(AttachmentKind),
    RemoveAttachment(i64),
    ClearAttachments,
    LoadSessionFile {
        filename: String,
        mime_type: String,
        bytes: Bytes,
    },
    SessionFileEncoded {
        token: LoadToken,
        result: std::result::Result<String, String>,
    },
    ClearSessionFile,
    CalendarLoaded(String),
    SetCalendarActive(bool),
    ClearCalendar,
    SwitchChat(ChatId),
}

/// Work the caller performs on the engine's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Base64-encode the bytes, then apply `Command::SessionFileEncoded`
    EncodeSessionFile { token: LoadToken, bytes: Bytes },
    /// Write a preference to the store
    Persist { key: String, value: Value },
}

/// Projection of the engine state shown by the surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    /// A send is in flight; send, catalog and plugin controls are disabled
    pub busy: bool,
    pub attach: AttachControls,
    pub checked: Vec<i64>,
    pub attachments: Vec<Attachment>,
    pub session_file: SessionFileView,
    pub calendar_loaded: bool,
    pub calendar_active: bool,
    pub plugins: PluginGate,
    pub web_search: bool,
    pub streaming: bool,
}

/// A turn accepted by `begin_send`, to be passed back to `finish_send`
#[derive(Debug, Clone)]
pub struct PreparedSend {
    pub chat: ChatId,
    /// Chat epoch at send time; a different epoch later means the user
    /// switched chats while the reply was in flight
    pub chat_epoch: u64,
    pub request: ChatRequest,
    /// Marker-annotated text for the transcript
    pub display: String,
    /// Generation of the session file included in this turn
    pub session_token: Option<LoadToken>,
}

pub struct Engine {
    config: EngineConfig,
    plugins: PluginGate,
    catalog: Catalog,
    selection: SelectionTracker,
    attachments: AttachmentComposer,
    session_file: SessionAttachmentHolder,
    calendar: CalendarContextHolder,
    /// Last requested calendar activation, re-applied on every snapshot load
    calendar_wanted: bool,
    web_search: bool,
    streaming: bool,
    busy: bool,
    chat: Option<ChatId>,
    chat_epoch: u64,
    status: StatusBoard,
}

impl Engine {
    pub fn new(config: EngineConfig, prefs: &UiPreferences) -> Self {
        Self {
            session_file: SessionAttachmentHolder::new(config.max_session_file_bytes),
            config,
            plugins: prefs.plugins,
            catalog: Catalog::default(),
            selection: SelectionTracker::new(),
            attachments: AttachmentComposer::new(),
            calendar: CalendarContextHolder::new(),
            calendar_wanted: prefs.calendar_active,
            web_search: false,
            streaming: prefs.streaming,
            busy: false,
            chat: None,
            chat_epoch: 0,
            status: StatusBoard::new(),
        }
    }

    /// Apply a command, returning the effects to perform
    pub fn apply(&mut self, command: Command) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Err(e) = self.reduce(command, &mut effects) {
            self.notify_error(&e);
        }
        effects
    }

    fn reduce(&mut self, command: Command, effects: &mut Vec<Effect>) -> Result<()> {
        match command {
            Command::SetPlugin { plugin, enabled } => {
                self.ensure_idle()?;
                self.set_plugin(plugin, enabled, effects);
            }
            Command::SetWebSearch(flag) => {
                if flag && !self.plugins.web_search {
                    self.web_search = false;
                    return Err(ChatError::PluginDisabled(Plugin::WebSearch));
                }
                self.web_search = flag;
            }
            Command::SetStreaming(flag) => {
                self.streaming = flag;
                effects.push(persist(keys::STREAMING, flag));
            }
            Command::CatalogLoaded(entries) => {
                self.catalog.replace(entries);
                for id in self.selection.prune(&self.catalog) {
                    self.attachments.detach(id);
                }
                let orphaned: Vec<i64> = self
                    .attachments
                    .attachments()
                    .iter()
                    .filter(|a| !self.selection.is_checked(a.file_id))
                    .map(|a| a.file_id)
                    .collect();
                for id in orphaned {
                    self.attachments.detach(id);
                }
            }
            Command::ToggleSelection(id) => {
                self.ensure_idle()?;
                let toggle = self.selection.toggle(id, &self.catalog, &self.plugins)?;
                if toggle == Toggle::Unchecked && self.attachments.detach(id) {
                    tracing::debug!(file_id = id, "Unchecked file detached");
                }
            }
            Command::CommitAttachments(kind) => {
                self.ensure_idle()?;
                let report = self
                    .attachments
                    .commit(kind, &self.selection, &self.plugins)?;
                let mut message = format!(
                    "Attached {} file{} as {}",
                    report.attached,
                    if report.attached == 1 { "" } else { "s" },
                    kind
                );
                if !report.without_summary.is_empty() {
                    message.push_str(&format!(
                        "; no summary for {}",
                        report.without_summary.join(", ")
                    ));
                    self.status.post(Notice::warning(message));
                } else {
                    self.status.post(Notice::info(message));
                }
            }
            Command::RemoveAttachment(id) => {
                self.ensure_idle()?;
                self.attachments.remove(id, &mut self.selection);
            }
            Command::ClearAttachments => {
                self.ensure_idle()?;
                self.attachments.clear_all();
            }
            Command::LoadSessionFile {
                filename,
                mime_type,
                bytes,
            } => {
                if !self.plugins.files {
                    return Err(ChatError::PluginDisabled(Plugin::Files));
                }
                match self
                    .session_file
                    .begin_load(filename, mime_type, bytes.len())
                {
                    Ok(token) => effects.push(Effect::EncodeSessionFile { token, bytes }),
                    Err(e) => self.notify_transient(&e),
                }
            }
            Command::SessionFileEncoded { token, result } => {
                if let Err(e) = self.session_file.complete_load(token, result) {
                    self.notify_transient(&e);
                }
            }
            Command::ClearSessionFile => self.session_file.clear(),
            Command::CalendarLoaded(text) => {
                if !self.plugins.calendar {
                    return Err(ChatError::PluginDisabled(Plugin::Calendar));
                }
                self.calendar.load(text);
                if self.calendar_wanted && self.calendar.set_active(true, &self.plugins).is_ok() {
                    tracing::debug!("Calendar context re-armed");
                }
            }
            Command::SetCalendarActive(flag) => {
                let result = self.calendar.set_active(flag, &self.plugins);
                self.calendar_wanted = self.calendar.is_active();
                effects.push(persist(keys::CALENDAR_ACTIVE, self.calendar_wanted));
                result?;
            }
            Command::ClearCalendar => self.calendar.clear(),
            Command::SwitchChat(chat) => {
                tracing::info!(chat = %chat, busy = self.busy, "Switching chat");
                self.chat = Some(chat);
                self.chat_epoch += 1;
                self.selection.clear();
                self.attachments.clear_all();
                self.calendar.clear();
            }
        }
        Ok(())
    }

    fn set_plugin(&mut self, plugin: Plugin, enabled: bool, effects: &mut Vec<Effect>) {
        if !self.plugins.set(plugin, enabled) {
            return;
        }
        effects.push(persist(keys::plugin(plugin), enabled));
        tracing::info!(plugin = %plugin, enabled, "Plugin toggled");

        if !enabled {
            match plugin {
                Plugin::Files => {
                    self.selection.clear();
                    self.attachments.clear_all();
                    self.session_file.clear();
                }
                Plugin::Calendar => self.calendar.clear(),
                Plugin::WebSearch => self.web_search = false,
            }
        }
        self.calendar.enforce(&self.plugins);

        let state = if enabled { "enabled" } else { "disabled" };
        let label = plugin.label();
        let mut chars = label.chars();
        let capitalized: String = chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect())
            .unwrap_or_default();
        self.status
            .post(Notice::info(format!("{} plugin {}", capitalized, state)));
    }

    /// Validate and compose a turn, and mark the engine busy
    ///
    /// A rejected send leaves the state untouched. An empty turn also posts
    /// a transient notice.
    pub fn begin_send(&mut self, text: &str) -> Result<PreparedSend> {
        if self.busy {
            return Err(ChatError::Busy);
        }
        let chat = self
            .chat
            .clone()
            .ok_or_else(|| ChatError::Validation("Open a chat before sending".to_string()))?;

        let sources = ContextSources {
            gate: &self.plugins,
            attachments: self.attachments.attachments(),
            session_file: self.session_file.current(),
            calendar_text: self.calendar.armed_text(&self.plugins),
            web_search: self.web_search,
        };
        let turn = match compose::compose(text, sources) {
            Ok(turn) => turn,
            Err(e) => {
                self.notify_transient(&e);
                return Err(e);
            }
        };

        let session_token = turn
            .session_attachment
            .as_ref()
            .and(self.session_file.current_token());
        let prepared = PreparedSend {
            chat,
            chat_epoch: self.chat_epoch,
            request: ChatRequest::from_turn(&turn, self.streaming),
            display: turn.display_text(),
            session_token,
        };

        self.busy = true;
        tracing::info!(
            chat = %prepared.chat,
            attachments = turn.attachments.len(),
            session_file = session_token.is_some(),
            calendar = turn.calendar_text.is_some(),
            web_search = turn.web_search_enabled,
            streaming = self.streaming,
            "Turn composed"
        );
        Ok(prepared)
    }

    /// Post-send cleanup; runs on success and failure alike
    ///
    /// The session file is cleared only if it is still the one that was
    /// sent; a file loaded during the request survives.
    pub fn finish_send(&mut self, prepared: &PreparedSend) {
        self.attachments.clear_all();
        self.selection.clear();
        if let Some(token) = prepared.session_token {
            if !self.session_file.clear_if(token) {
                tracing::debug!(
                    token = token.value(),
                    "Session file replaced during send; keeping the newer one"
                );
            }
        }
        self.busy = false;
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.busy {
            return Err(ChatError::Busy);
        }
        Ok(())
    }

    fn notify_error(&mut self, err: &ChatError) {
        self.status.post(Notice::from_error(err));
    }

    fn notify_transient(&mut self, err: &ChatError) {
        let ttl = self.config.transient_notice();
        self.status.post(Notice::from_error(err).with_ttl(ttl));
    }

    pub fn controls(&self) -> ControlState {
        ControlState {
            busy: self.busy,
            attach: if self.plugins.files && !self.busy {
                self.selection.controls()
            } else {
                AttachControls::default()
            },
            checked: self.selection.ids(),
            attachments: self.attachments.attachments().to_vec(),
            session_file: self.session_file.view(),
            calendar_loaded: self.calendar.is_loaded(),
            calendar_active: self.calendar.is_active(),
            plugins: self.plugins,
            web_search: self.web_search,
            streaming: self.streaming,
        }
    }

    /// Post a notice raised outside the reducer (e.g. a failed fetch)
    pub fn post_notice(&mut self, notice: Notice) {
        self.status.post(notice);
    }

    /// Post an error as a notice that expires after the transient lifetime
    pub fn post_transient(&mut self, err: &ChatError) {
        self.notify_transient(err);
    }

    /// Notices posted since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.status.drain_new()
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn plugins(&self) -> &PluginGate {
        &self.plugins
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn attachments(&self) -> &AttachmentComposer {
        &self.attachments
    }

    pub fn session_file(&self) -> &SessionAttachmentHolder {
        &self.session_file
    }

    pub fn calendar(&self) -> &CalendarContextHolder {
        &self.calendar
    }

    pub fn chat(&self) -> Option<&ChatId> {
        self.chat.as_ref()
    }

    pub fn chat_epoch(&self) -> u64 {
        self.chat_epoch
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn persist(key: &str, flag: bool) -> Effect {
    Effect::Persist {
        key: key.to_string(),
        value: Value::Bool(flag),
    }
}
