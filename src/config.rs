//! Engine configuration
//!
//! Built programmatically via `EngineConfig::default()` + `with_*` methods,
//! or parsed from JSON. Missing fields fall back to defaults.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default session file limit (10 MiB)
pub const DEFAULT_MAX_SESSION_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Default lifetime of transient error tags
pub const DEFAULT_TRANSIENT_NOTICE_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Largest session file accepted, in bytes
    #[serde(default = "default_max_session_file_bytes")]
    pub max_session_file_bytes: usize,

    /// How long transient notices (e.g. file read failures) stay visible
    #[serde(default = "default_transient_notice_ms")]
    pub transient_notice_ms: u64,

    /// Streaming preference used until a persisted value is found
    #[serde(default = "default_true")]
    pub streaming_default: bool,
}

fn default_max_session_file_bytes() -> usize {
    DEFAULT_MAX_SESSION_FILE_BYTES
}

fn default_transient_notice_ms() -> u64 {
    DEFAULT_TRANSIENT_NOTICE_MS
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_session_file_bytes: DEFAULT_MAX_SESSION_FILE_BYTES,
            transient_notice_ms: DEFAULT_TRANSIENT_NOTICE_MS,
            streaming_default: true,
        }
    }
}

impl EngineConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_session_file_bytes(mut self, bytes: usize) -> Self {
        self.max_session_file_bytes = bytes;
        self
    }

    pub fn with_transient_notice_ms(mut self, ms: u64) -> Self {
        self.transient_notice_ms = ms;
        self
    }

    pub fn with_streaming_default(mut self, enabled: bool) -> Self {
        self.streaming_default = enabled;
        self
    }

    pub fn transient_notice(&self) -> Duration {
        Duration::from_millis(self.transient_notice_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_session_file_bytes == 0 {
            return Err(ChatError::Config(
                "maxSessionFileBytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
