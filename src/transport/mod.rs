//! Chat transport trait, the seam between the engine and the backend
//!
//! A transport lists the file catalog, fetches the calendar snapshot,
//! loads chat history and sends turns. `HttpTransport` talks to the chat
//! backend over HTTP; `MemoryTransport` replays scripted replies for tests.

use crate::compose::ChatRequest;
use crate::error::Result;
use crate::types::{CatalogEntry, ChatId, HistoryMessage};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub mod http;
pub mod memory;

/// Stream of raw reply chunks
pub type ReplyStream = BoxStream<'static, Result<Bytes>>;

/// Reply to a sent turn
pub enum Reply {
    /// Whole reply in one JSON document
    Complete(String),
    /// Incremental UTF-8 byte chunks
    Stream(ReplyStream),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Backend operations used by a chat session
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the uploaded-file catalog
    async fn list_files(&self) -> Result<Vec<CatalogEntry>>;

    /// Fetch a textual snapshot of upcoming calendar events
    async fn fetch_calendar(&self) -> Result<String>;

    /// Load the stored messages of a chat, oldest first
    async fn load_history(&self, chat: &ChatId) -> Result<Vec<HistoryMessage>>;

    /// Send a composed turn
    ///
    /// Returns once the response headers are in; a streamed body is read
    /// through the returned `Reply::Stream`.
    async fn send(&self, chat: &ChatId, request: &ChatRequest) -> Result<Reply>;

    /// Transport name (e.g., "http", "memory")
    fn name(&self) -> &str;
}

/// Incremental UTF-8 decoder for reply chunks
///
/// A multi-byte character split across two chunks is held back until the
/// rest arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    carry: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, returning the text that is complete so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush bytes still held back at end of stream
    pub fn finish(&mut self) -> String {
        let carry = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&carry).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut d = ChunkDecoder::new();
        assert_eq!(d.decode(b"Hel"), "Hel");
        assert_eq!(d.decode(b"lo"), "lo");
        assert!(!d.has_pending());
    }

    #[test]
    fn test_split_multibyte() {
        let bytes = "héllo 日本".as_bytes();
        // 'é' is two bytes at offset 1..3; cut inside it
        let mut d = ChunkDecoder::new();
        let a = d.decode(&bytes[..2]);
        assert_eq!(a, "h");
        assert!(d.has_pending());
        let b = d.decode(&bytes[2..bytes.len() - 1]);
        let c = d.decode(&bytes[bytes.len() - 1..]);
        assert_eq!(format!("{}{}{}", a, b, c), "héllo 日本");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut d = ChunkDecoder::new();
        assert_eq!(d.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_flushed_lossy() {
        let mut d = ChunkDecoder::new();
        assert_eq!(d.decode(&"日".as_bytes()[..2]), "");
        assert_eq!(d.finish(), "\u{FFFD}");
    }
}
