//! HTTP chat transport
//!
//! Implements `ChatTransport` against the chat backend's REST API. Replies
//! come back as a single JSON document or as a raw byte stream, told apart
//! by the response content type.

mod client;
mod config;

pub use client::HttpClient;
pub use config::TransportConfig;

use crate::compose::ChatRequest;
use crate::error::Result;
use crate::transport::{ChatTransport, Reply};
use crate::types::{CatalogEntry, ChatId, HistoryMessage};
use async_trait::async_trait;

/// HTTP chat transport
///
/// Wraps `HttpClient` and implements the `ChatTransport` trait.
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn list_files(&self) -> Result<Vec<CatalogEntry>> {
        self.client.list_files().await
    }

    async fn fetch_calendar(&self) -> Result<String> {
        self.client.fetch_calendar().await
    }

    async fn load_history(&self, chat: &ChatId) -> Result<Vec<HistoryMessage>> {
        self.client.load_history(chat).await
    }

    async fn send(&self, chat: &ChatId, request: &ChatRequest) -> Result<Reply> {
        self.client.send(chat, request).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
