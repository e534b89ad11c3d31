//! Error types for a3s-chat

use crate::plugins::Plugin;
use thiserror::Error;

/// Errors that can occur while composing, sending, or rendering a chat turn
#[derive(Debug, Error)]
pub enum ChatError {
    /// Input rejected locally before reaching the transport
    /// (oversized file, empty send attempt)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A send is already in flight
    #[error("A message is already being sent")]
    Busy,

    /// The plugin gating this context source is disabled
    #[error("The {0} plugin is disabled")]
    PluginDisabled(Plugin),

    /// Non-success response status or network failure
    #[error("{}", transport_message(.status, .reason))]
    Transport {
        status: Option<u16>,
        reason: String,
    },

    /// Failure while reading the reply stream
    #[error("Stream read failed: {0}")]
    StreamRead(String),

    /// A local file could not be read or encoded
    #[error("Failed to read file: {0}")]
    FileRead(String),

    /// Stream state transition not allowed from the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Referenced item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn transport_message(status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, reason),
        None => reason.to_string(),
    }
}

impl ChatError {
    /// Build a transport error from a network failure without a status
    pub fn network(reason: impl Into<String>) -> Self {
        ChatError::Transport {
            status: None,
            reason: reason.into(),
        }
    }

    /// Whether the error was raised locally before any request was issued
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ChatError::Validation(_) | ChatError::Busy | ChatError::PluginDisabled(_)
        )
    }
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = ChatError::Transport {
            status: Some(502),
            reason: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");

        let err = ChatError::network("connection reset");
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn test_local_errors() {
        assert!(ChatError::Busy.is_local());
        assert!(ChatError::Validation("empty".into()).is_local());
        assert!(!ChatError::network("down").is_local());
        assert!(!ChatError::StreamRead("eof".into()).is_local());
    }
}
