//! UI markers, in-band placeholders embedded in message text
//!
//! Grammar:
//!
//! ```text
//! [UI-MARKER:file:<filename>:<kind>]   kind ∈ full | summary | session
//! [UI-MARKER:calendar]
//! [UI-MARKER:websearch]
//! [UI-MARKER:error:<filename>]
//! ```
//!
//! [`substitute`] replaces every marker with an inline badge. It must run
//! before markdown conversion (see [`crate::render`]).

use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

const PREFIX: &str = "[UI-MARKER:";

/// Stand-in for an empty filename
pub const UNTITLED: &str = "untitled";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[UI-MARKER:(?:file:([^\]\n]+):(full|summary|session)|(calendar)|(websearch)|error:([^\]\n]+))\]",
        )
        .expect("marker pattern is valid")
    })
}

/// What a file marker says about how the file was attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileBadge {
    Full,
    Summary,
    Session,
}

impl FileBadge {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileBadge::Full => "full",
            FileBadge::Summary => "summary",
            FileBadge::Session => "session",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(FileBadge::Full),
            "summary" => Some(FileBadge::Summary),
            "session" => Some(FileBadge::Session),
            _ => None,
        }
    }
}

impl From<crate::types::AttachmentKind> for FileBadge {
    fn from(kind: crate::types::AttachmentKind) -> Self {
        match kind {
            crate::types::AttachmentKind::Full => FileBadge::Full,
            crate::types::AttachmentKind::Summary => FileBadge::Summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    File { filename: String, badge: FileBadge },
    Calendar,
    WebSearch,
    Error { filename: String },
}

impl Marker {
    pub fn file(filename: &str, badge: FileBadge) -> Self {
        Marker::File {
            filename: marker_safe(filename),
            badge,
        }
    }

    pub fn error(filename: &str) -> Self {
        Marker::Error {
            filename: marker_safe(filename),
        }
    }

    /// Inline badge markup for this marker
    pub fn badge_html(&self) -> String {
        match self {
            Marker::File { filename, badge } => format!(
                "<span class=\"ui-badge ui-badge-file ui-badge-{kind}\" title=\"{name}\">{name} ({kind})</span>",
                kind = badge.as_str(),
                name = badge_escape(filename),
            ),
            Marker::Calendar => {
                "<span class=\"ui-badge ui-badge-calendar\">Calendar</span>".to_string()
            }
            Marker::WebSearch => {
                "<span class=\"ui-badge ui-badge-websearch\">Web Search</span>".to_string()
            }
            Marker::Error { filename } => format!(
                "<span class=\"ui-badge ui-badge-error\" title=\"{name}\">{name} (error)</span>",
                name = badge_escape(filename),
            ),
        }
    }

    fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        if let (Some(name), Some(kind)) = (caps.get(1), caps.get(2)) {
            return FileBadge::parse(kind.as_str()).map(|badge| Marker::File {
                filename: name.as_str().to_string(),
                badge,
            });
        }
        if caps.get(3).is_some() {
            return Some(Marker::Calendar);
        }
        if caps.get(4).is_some() {
            return Some(Marker::WebSearch);
        }
        caps.get(5).map(|name| Marker::Error {
            filename: name.as_str().to_string(),
        })
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::File { filename, badge } => {
                write!(f, "{}file:{}:{}]", PREFIX, filename, badge.as_str())
            }
            Marker::Calendar => write!(f, "{}calendar]", PREFIX),
            Marker::WebSearch => write!(f, "{}websearch]", PREFIX),
            Marker::Error { filename } => write!(f, "{}error:{}]", PREFIX, filename),
        }
    }
}

/// Make a filename safe to embed inside a marker
///
/// Brackets and line breaks would end the marker early, so they are
/// replaced with parentheses and spaces. An empty name becomes
/// [`UNTITLED`] since the grammar needs at least one character.
pub fn marker_safe(filename: &str) -> String {
    if filename.is_empty() {
        return UNTITLED.to_string();
    }
    filename
        .chars()
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

/// Replace every marker in `text` with its badge markup
pub fn substitute(text: &str) -> String {
    if !text.contains(PREFIX) {
        return text.to_string();
    }
    marker_regex()
        .replace_all(text, |caps: &Captures<'_>| match Marker::from_captures(caps) {
            Some(marker) => marker.badge_html(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// All markers found in `text`, in order of appearance
pub fn find_markers(text: &str) -> Vec<Marker> {
    marker_regex()
        .captures_iter(text)
        .filter_map(|caps| Marker::from_captures(&caps))
        .collect()
}

/// Remove markers, leaving only the literal message text
///
/// Used for plain-text previews. The newline separating the marker prefix
/// from the message is dropped along with it.
pub fn strip(text: &str) -> String {
    let stripped = marker_regex().replace_all(text, "").into_owned();
    if text.starts_with(PREFIX) {
        if let Some(rest) = stripped.strip_prefix('\n') {
            return rest.to_string();
        }
    }
    stripped
}

/// Escape for badge labels: HTML specials plus markdown punctuation, so the
/// label survives the markdown pass verbatim
fn badge_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '*' => out.push_str("&#42;"),
            '_' => out.push_str("&#95;"),
            '`' => out.push_str("&#96;"),
            '\\' => out.push_str("&#92;"),
            '~' => out.push_str("&#126;"),
            other => out.push(other),
        }
    }
    out
}
