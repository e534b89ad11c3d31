//! Chat session: drives the engine against a transport and a surface
//!
//! `ChatSession` owns the collaborators and the shared state. It forwards
//! user commands to the [`Engine`] reducer, carries out the returned
//! effects (encoding, preference writes), and runs the send flow:
//! compose, render the user turn, open the reply, apply chunks in arrival
//! order, finalize, and always run post-send cleanup.

use crate::engine::{Command, ControlState, Effect, Engine, PreparedSend};
use crate::config::EngineConfig;
use crate::error::{ChatError, Result};
use crate::plugins::Plugin;
use crate::render::{MarkdownConverter, MarkupConverter};
use crate::session_file::encode_content;
use crate::state::{keys, PreferenceStore, UiPreferences};
use crate::status::Notice;
use crate::transcript::{SurfaceUpdate, Transcript, TranscriptEntry, TranscriptSurface};
use crate::transport::{ChatTransport, ChunkDecoder, Reply};
use crate::types::{ChatId, MessageId};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A chat session bound to one transport and one surface
///
/// Thread-safe; methods take `&self` and may be called concurrently (e.g.
/// switching chats while a reply streams). Engine and transcript locks are
/// never held across a transport await.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    surface: Arc<dyn TranscriptSurface>,
    prefs: Arc<dyn PreferenceStore>,
    preferences: UiPreferences,
    engine: Arc<RwLock<Engine>>,
    transcript: Arc<RwLock<Transcript>>,
}

impl ChatSession {
    /// Create a session, reading persisted preferences once
    ///
    /// An unreadable preference store falls back to defaults.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        surface: Arc<dyn TranscriptSurface>,
        prefs: Arc<dyn PreferenceStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let preferences = match UiPreferences::load(prefs.as_ref(), &config) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load preferences, using defaults");
                UiPreferences::defaults(&config)
            }
        };
        tracing::info!(
            transport = transport.name(),
            files = preferences.plugins.files,
            calendar = preferences.plugins.calendar,
            web_search = preferences.plugins.web_search,
            streaming = preferences.streaming,
            "Chat session created"
        );

        let engine = Engine::new(config, &preferences);
        Ok(Self {
            transport,
            surface,
            prefs,
            preferences,
            engine: Arc::new(RwLock::new(engine)),
            transcript: Arc::new(RwLock::new(Transcript::new(Arc::new(
                MarkdownConverter::default(),
            )))),
        })
    }

    /// Use a different markup converter for finalized messages
    pub fn with_converter(mut self, converter: Arc<dyn MarkupConverter>) -> Self {
        self.transcript = Arc::new(RwLock::new(Transcript::new(converter)));
        self
    }

    /// Get the transport name
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Preferences as read at startup
    pub fn preferences(&self) -> &UiPreferences {
        &self.preferences
    }

    /// Apply a command and carry out its effects
    pub async fn dispatch(&self, command: Command) {
        let mut queue: VecDeque<Effect> = self.with_engine(|e| e.apply(command)).await.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Persist { key, value } => self.persist(&key, value),
                Effect::EncodeSessionFile { token, bytes } => {
                    let result = encode_content(bytes).await;
                    let follow = self
                        .with_engine(|e| e.apply(Command::SessionFileEncoded { token, result }))
                        .await;
                    queue.extend(follow);
                }
            }
        }
    }

    /// Fetch the file catalog and reconcile selections against it
    pub async fn refresh_catalog(&self) -> Result<()> {
        match self.transport.list_files().await {
            Ok(files) => {
                self.dispatch(Command::CatalogLoaded(files)).await;
                Ok(())
            }
            Err(e) => {
                self.report(&e).await;
                Err(e)
            }
        }
    }

    /// Fetch a calendar snapshot and hold it for the next message
    pub async fn load_calendar(&self) -> Result<()> {
        if !self.engine.read().await.plugins().calendar {
            let err = ChatError::PluginDisabled(Plugin::Calendar);
            self.report(&err).await;
            return Err(err);
        }
        match self.transport.fetch_calendar().await {
            Ok(text) => {
                self.dispatch(Command::CalendarLoaded(text)).await;
                Ok(())
            }
            Err(e) => {
                self.report(&e).await;
                Err(e)
            }
        }
    }

    /// Load in-memory file content as the session attachment
    pub async fn load_session_file(
        &self,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Bytes,
    ) {
        self.dispatch(Command::LoadSessionFile {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        })
        .await;
    }

    /// Read a local file and load it as the session attachment
    ///
    /// The MIME type is guessed from the extension.
    pub async fn load_session_file_from_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let read = async {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ChatError::FileRead(format!("{} is not a file", path.display())))?;
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ChatError::FileRead(format!("{}: {}", path.display(), e)))?;
            Ok::<_, ChatError>((filename, bytes))
        };

        match read.await {
            Ok((filename, bytes)) => {
                let mime_type = mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string();
                self.load_session_file(filename, mime_type, Bytes::from(bytes))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.with_engine(|engine| engine.post_transient(&e)).await;
                Err(e)
            }
        }
    }

    /// Switch to a chat and restore its history
    ///
    /// Selections, attachments and the calendar snapshot are cleared. A
    /// reply still streaming for the previous chat is no longer rendered.
    pub async fn open_chat(&self, chat: ChatId) -> Result<()> {
        self.dispatch(Command::SwitchChat(chat.clone())).await;
        let epoch = self.engine.read().await.chat_epoch();

        let history = self.transport.load_history(&chat).await;

        let mut transcript = self.transcript.write().await;
        if self.engine.read().await.chat_epoch() != epoch {
            tracing::debug!(chat = %chat, "Chat switched again before history arrived");
            return Ok(());
        }
        match history {
            Ok(messages) => {
                tracing::info!(chat = %chat, messages = messages.len(), "Chat history restored");
                for update in transcript.restore(&messages) {
                    self.surface.apply(update);
                }
                Ok(())
            }
            Err(e) => {
                self.surface.apply(transcript.clear());
                drop(transcript);
                self.report(&e).await;
                Err(e)
            }
        }
    }

    /// Compose and send a turn, rendering the reply as it arrives
    ///
    /// Transport and stream failures are rendered inline on the reply and
    /// also returned. Attachments, selections and the sent session file are
    /// cleared afterwards whatever the outcome.
    pub async fn send(&self, text: &str) -> Result<()> {
        let prepared = self.with_engine(|e| e.begin_send(text)).await?;

        let reply_id = {
            let mut transcript = self.transcript.write().await;
            let (_, user) = transcript.push_user(&prepared.display);
            self.surface.apply(user);
            transcript.begin_reply().map(|(id, pending)| {
                self.surface.apply(pending);
                id
            })
        };

        let outcome = match reply_id {
            Ok(id) => self.deliver(&prepared, &id).await,
            Err(e) => Err(e),
        };

        self.with_engine(|e| e.finish_send(&prepared)).await;
        match &outcome {
            Ok(()) => tracing::info!(chat = %prepared.chat, "Turn completed"),
            Err(e) => tracing::warn!(chat = %prepared.chat, error = %e, "Turn failed"),
        }
        outcome
    }

    async fn deliver(&self, prepared: &PreparedSend, id: &MessageId) -> Result<()> {
        let reply = match self.transport.send(&prepared.chat, &prepared.request).await {
            Ok(reply) => reply,
            Err(e) => {
                self.fail_reply(prepared, id, &e).await;
                return Err(e);
            }
        };

        match reply {
            Reply::Complete(text) => {
                self.render(prepared, |t| Ok(vec![t.complete(id, &text)?]))
                    .await
            }
            Reply::Stream(mut stream) => {
                let mut decoder = ChunkDecoder::new();
                while let Some(chunk) = stream.next().await {
                    let bytes = match chunk {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            self.fail_reply(prepared, id, &e).await;
                            return Err(e);
                        }
                    };
                    let text = decoder.decode(&bytes);
                    self.render(prepared, |t| t.push_chunk(id, &text)).await?;
                }
                let tail = decoder.finish();
                if !tail.is_empty() {
                    self.render(prepared, |t| t.push_chunk(id, &tail)).await?;
                }
                self.render(prepared, |t| Ok(vec![t.finish(id)?])).await
            }
        }
    }

    async fn fail_reply(&self, prepared: &PreparedSend, id: &MessageId, err: &ChatError) {
        let reason = err.to_string();
        if let Err(e) = self
            .render(prepared, |t| Ok(vec![t.fail(id, &reason)?]))
            .await
        {
            tracing::debug!(error = %e, "Could not mark reply as failed");
        }
    }

    /// Apply a transcript step and forward its updates, unless the chat
    /// the turn belongs to is no longer open
    async fn render<F>(&self, prepared: &PreparedSend, step: F) -> Result<()>
    where
        F: FnOnce(&mut Transcript) -> Result<Vec<SurfaceUpdate>>,
    {
        let mut transcript = self.transcript.write().await;
        if self.engine.read().await.chat_epoch() != prepared.chat_epoch {
            tracing::debug!(chat = %prepared.chat, "Reply for inactive chat not rendered");
            return Ok(());
        }
        for update in step(&mut transcript)? {
            self.surface.apply(update);
        }
        Ok(())
    }

    /// Remember the open tab
    pub fn set_last_tab(&self, tab: &str) -> Result<()> {
        self.prefs.set(keys::LAST_TAB, Value::String(tab.to_string()))
    }

    /// Remember a section's collapsed state
    pub fn set_collapsed(&self, section: &str, collapsed: bool) -> Result<()> {
        self.prefs
            .set(&keys::collapsed(section), Value::Bool(collapsed))
    }

    pub async fn controls(&self) -> ControlState {
        self.engine.read().await.controls()
    }

    /// Snapshot of the rendered transcript
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.read().await.entries().to_vec()
    }

    /// Run a closure against the engine, then publish notices and controls
    async fn with_engine<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let (out, notices, controls) = {
            let mut engine = self.engine.write().await;
            let out = f(&mut engine);
            (out, engine.drain_notices(), engine.controls())
        };
        for notice in notices {
            self.surface.apply(SurfaceUpdate::Status(notice));
        }
        self.surface.apply(SurfaceUpdate::Controls(controls));
        out
    }

    async fn report(&self, err: &ChatError) {
        let notice = Notice::from_error(err);
        self.with_engine(|e| e.post_notice(notice)).await;
    }

    fn persist(&self, key: &str, value: Value) {
        if let Err(e) = self.prefs.set(key, value) {
            tracing::warn!(key, error = %e, "Failed to persist preference");
        }
    }
}
