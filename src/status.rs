//! Transient status messages shown next to the composer

use crate::error::ChatError;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,

    /// How long the notice stays visible; `None` until replaced
    #[serde(skip)]
    pub ttl: Option<Duration>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            ttl: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            ttl: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Map an engine error to the notice shown for it
    pub fn from_error(err: &ChatError) -> Self {
        match err {
            ChatError::Validation(_)
            | ChatError::PluginDisabled(_)
            | ChatError::Busy
            | ChatError::NotFound(_) => Notice::warning(err.to_string()),
            _ => Notice::error(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct Posted {
    notice: Notice,
    posted_at: Instant,
}

/// Recently posted notices, newest last
///
/// Notices with a TTL retract themselves once it elapses.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    posted: Vec<Posted>,
    unread: Vec<Notice>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, notice: Notice) {
        self.post_at(notice, Instant::now());
    }

    pub fn post_at(&mut self, notice: Notice, now: Instant) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "Status error"),
            _ => tracing::debug!(message = %notice.message, "Status notice"),
        }
        self.unread.push(notice.clone());
        self.posted.push(Posted {
            notice,
            posted_at: now,
        });
    }

    /// Notices posted since the last drain, for forwarding to the surface
    pub fn drain_new(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.unread)
    }

    /// Notices still visible at `now`
    pub fn visible(&self, now: Instant) -> Vec<&Notice> {
        self.posted
            .iter()
            .filter(|p| !is_expired(p, now))
            .map(|p| &p.notice)
            .collect()
    }

    /// Drop expired notices
    pub fn prune(&mut self, now: Instant) {
        self.posted.retain(|p| !is_expired(p, now));
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.posted.last().map(|p| &p.notice)
    }
}

fn is_expired(posted: &Posted, now: Instant) -> bool {
    posted
        .notice
        .ttl
        .map(|ttl| now.saturating_duration_since(posted.posted_at) >= ttl)
        .unwrap_or(false)
}
