//! # a3s-chat
//!
//! Context-aware chat composer and streaming transcript for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-chat` manages the context a user arms for the next chat turn
//! (uploaded files as full text or summary, one local session file, a
//! calendar snapshot, a web-search flag), composes the outgoing payload,
//! and renders the reply incrementally while it streams. Backends and
//! rendering surfaces are pluggable.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_chat::{ChatId, ChatSession, EngineConfig, MemoryPreferenceStore, MemorySurface};
//! use a3s_chat::transport::memory::{MemoryTransport, ScriptedReply};
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_chat::Result<()> {
//! let transport = Arc::new(MemoryTransport::new());
//! transport.push_reply(ScriptedReply::chunks(["Hel", "lo"]));
//!
//! let surface = Arc::new(MemorySurface::new());
//! let session = ChatSession::new(
//!     transport,
//!     surface.clone(),
//!     Arc::new(MemoryPreferenceStore::default()),
//!     EngineConfig::default(),
//! )?;
//!
//! session.open_chat(ChatId::new("chat-1")).await?;
//! session.send("Hi there").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **http** — REST backend; JSON or streamed replies
//! - **memory** — Scripted replies for tests and demos
//!
//! ## Architecture
//!
//! - **Engine** — all context state behind one `Command` reducer
//! - **ChatSession** — runs sends and effects against the collaborators
//! - **ChatTransport** trait — backend abstraction
//! - **TranscriptSurface** trait — receives `SurfaceUpdate`s
//! - **Markers** — `[UI-MARKER:...]` tokens rendered as inline badges

pub mod attachments;
pub mod calendar;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod marker;
pub mod plugins;
pub mod render;
pub mod selection;
pub mod session;
pub mod session_file;
pub mod state;
pub mod status;
pub mod transcript;
pub mod transport;
pub mod types;

// Re-export core types
pub use compose::{ChatRequest, OutgoingTurn};
pub use config::EngineConfig;
pub use engine::{Command, ControlState, Effect, Engine, PreparedSend};
pub use error::{ChatError, Result};
pub use marker::Marker;
pub use plugins::{Plugin, PluginGate};
pub use render::{MarkdownConverter, MarkupConverter};
pub use session::ChatSession;
pub use state::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, UiPreferences};
pub use status::{Notice, NoticeLevel};
pub use transcript::{MemorySurface, StreamState, SurfaceUpdate, TranscriptSurface};
pub use types::{
    Attachment, AttachmentKind, CatalogEntry, ChatId, HistoryMessage, MessageId, Role,
};

// Re-export transports for convenience
pub use transport::http::{HttpTransport, TransportConfig};
pub use transport::memory::{MemoryTransport, ScriptedReply};
pub use transport::{ChatTransport, Reply};
