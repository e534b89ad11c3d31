//! HTTP client for the chat backend

use super::config::TransportConfig;
use crate::compose::ChatRequest;
use crate::error::{ChatError, Result};
use crate::transport::Reply;
use crate::types::{CatalogEntry, ChatId, HistoryMessage};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct CalendarSnapshot {
    #[serde(default)]
    events: String,
}

#[derive(Debug, Deserialize)]
struct CompleteReply {
    reply: String,
}

/// Low-level HTTP client
///
/// Owns the connection pool and maps backend responses onto `ChatError`.
pub struct HttpClient {
    client: reqwest::Client,
    config: Arc<TransportConfig>,
}

impl HttpClient {
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(base_url = %config.base_url, "HTTP transport ready");
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub async fn list_files(&self) -> Result<Vec<CatalogEntry>> {
        let files: Vec<CatalogEntry> = self.get_json("/api/files").await?;
        tracing::debug!(count = files.len(), "File catalog fetched");
        Ok(files)
    }

    pub async fn fetch_calendar(&self) -> Result<String> {
        let snapshot: CalendarSnapshot = self.get_json("/api/calendar/events").await?;
        Ok(snapshot.events)
    }

    pub async fn load_history(&self, chat: &ChatId) -> Result<Vec<HistoryMessage>> {
        self.get_json(&messages_path(chat)).await
    }

    pub async fn send(&self, chat: &ChatId, request: &ChatRequest) -> Result<Reply> {
        let url = self.config.url(&messages_path(chat));
        let response = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::network(format!("{}: {}", url, e)))?;
        let response = check_status(response).await?;

        if is_json(&response) {
            let body: CompleteReply = response
                .json()
                .await
                .map_err(|e| ChatError::network(format!("Invalid reply body: {}", e)))?;
            tracing::debug!(chat = %chat, len = body.reply.len(), "Complete reply received");
            return Ok(Reply::Complete(body.reply));
        }

        tracing::debug!(chat = %chat, "Streaming reply opened");
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::StreamRead(e.to_string())))
            .boxed();
        Ok(Reply::Stream(stream))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.url(path);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ChatError::network(format!("{}: {}", url, e)))?;
        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::network(format!("{}: {}", url, e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn messages_path(chat: &ChatId) -> String {
    format!("/api/chats/{}/messages", chat.as_str())
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    tracing::warn!(status = status.as_u16(), reason = %reason, "Backend request failed");
    Err(ChatError::Transport {
        status: Some(status.as_u16()),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_path() {
        assert_eq!(
            messages_path(&ChatId::new("c-42")),
            "/api/chats/c-42/messages"
        );
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(HttpClient::new(TransportConfig::new("ftp://nope")).is_err());
    }

    #[test]
    fn test_calendar_snapshot_missing_events() {
        let snapshot: CalendarSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.events.is_empty());
    }
}
