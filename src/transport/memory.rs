//! In-memory transport with scripted replies
//!
//! Replies are queued ahead of time and consumed one per `send`. Every sent
//! request is recorded so tests can inspect the wire payload.

use crate::compose::ChatRequest;
use crate::error::{ChatError, Result};
use crate::transport::{ChatTransport, Reply};
use crate::types::{CatalogEntry, ChatId, HistoryMessage};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A reply queued for the next `send`
#[derive(Debug)]
pub enum ScriptedReply {
    /// JSON reply delivered whole
    Complete(String),
    /// Streamed chunks; an `Err` item fails the stream at that point
    Chunks(Vec<std::result::Result<String, String>>),
    /// Chunks pushed by the test through a channel
    Channel(mpsc::Receiver<Result<Bytes>>),
    /// The request itself fails
    Fail { status: Option<u16>, reason: String },
}

impl ScriptedReply {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedReply::Chunks(chunks.into_iter().map(|c| Ok(c.into())).collect())
    }

    /// A channel-fed reply and the sender that drives it
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<Bytes>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, ScriptedReply::Channel(rx))
    }
}

#[derive(Default)]
struct Inner {
    files: Vec<CatalogEntry>,
    calendar: String,
    history: HashMap<ChatId, Vec<HistoryMessage>>,
    replies: VecDeque<ScriptedReply>,
    sent: Vec<(ChatId, ChatRequest)>,
}

/// In-memory chat transport for tests and demos
#[derive(Default)]
pub struct MemoryTransport {
    inner: RwLock<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(self, files: Vec<CatalogEntry>) -> Self {
        self.set_files(files);
        self
    }

    pub fn with_calendar(self, text: impl Into<String>) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner.calendar = text.into();
        }
        self
    }

    pub fn with_history(self, chat: ChatId, messages: Vec<HistoryMessage>) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner.history.insert(chat, messages);
        }
        self
    }

    /// Replace the catalog returned by `list_files`
    pub fn set_files(&self, files: Vec<CatalogEntry>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.files = files;
        }
    }

    /// Queue a reply for the next `send`
    pub fn push_reply(&self, reply: ScriptedReply) {
        if let Ok(mut inner) = self.inner.write() {
            inner.replies.push_back(reply);
        }
    }

    /// Requests sent so far, oldest first
    pub fn sent(&self) -> Vec<(ChatId, ChatRequest)> {
        self.inner
            .read()
            .map(|inner| inner.sent.clone())
            .unwrap_or_default()
    }

    fn lock_err(e: impl std::fmt::Display) -> ChatError {
        ChatError::network(format!("Memory transport lock poisoned: {}", e))
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn list_files(&self) -> Result<Vec<CatalogEntry>> {
        let inner = self.inner.read().map_err(Self::lock_err)?;
        Ok(inner.files.clone())
    }

    async fn fetch_calendar(&self) -> Result<String> {
        let inner = self.inner.read().map_err(Self::lock_err)?;
        Ok(inner.calendar.clone())
    }

    async fn load_history(&self, chat: &ChatId) -> Result<Vec<HistoryMessage>> {
        let inner = self.inner.read().map_err(Self::lock_err)?;
        Ok(inner.history.get(chat).cloned().unwrap_or_default())
    }

    async fn send(&self, chat: &ChatId, request: &ChatRequest) -> Result<Reply> {
        let reply = {
            let mut inner = self.inner.write().map_err(Self::lock_err)?;
            inner.sent.push((chat.clone(), request.clone()));
            inner.replies.pop_front()
        };

        match reply {
            None => Err(ChatError::Transport {
                status: Some(503),
                reason: "No scripted reply".to_string(),
            }),
            Some(ScriptedReply::Complete(text)) => Ok(Reply::Complete(text)),
            Some(ScriptedReply::Fail { status, reason }) => {
                Err(ChatError::Transport { status, reason })
            }
            Some(ScriptedReply::Chunks(chunks)) => {
                let items = chunks.into_iter().map(|c| match c {
                    Ok(text) => Ok(Bytes::from(text)),
                    Err(reason) => Err(ChatError::StreamRead(reason)),
                });
                Ok(Reply::Stream(tokio_stream::iter(items).boxed()))
            }
            Some(ScriptedReply::Channel(rx)) => Ok(Reply::Stream(ReceiverStream::new(rx).boxed())),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
