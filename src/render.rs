//! Render pipeline for transcript text
//!
//! Two passes with a fixed order: markers are substituted with badge markup
//! first, then the result is converted from markdown. Streaming content skips
//! both and is shown as escaped literal text until the reply is finalized.

use crate::marker;
use pulldown_cmark::{html, Options, Parser};

/// Converts markdown text to markup
///
/// Treated as a pure function. Inline HTML (the badges produced by the
/// marker pass) must be passed through unchanged.
pub trait MarkupConverter: Send + Sync {
    fn convert(&self, text: &str) -> String;
}

/// CommonMark converter backed by `pulldown_cmark`
#[derive(Debug, Clone, Copy)]
pub struct MarkdownConverter {
    options: Options,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
        }
    }
}

impl MarkdownConverter {
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }
}

impl MarkupConverter for MarkdownConverter {
    fn convert(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.options);
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Final rendering: markers first, markdown second
pub fn render_final(text: &str, converter: &dyn MarkupConverter) -> String {
    converter.convert(&marker::substitute(text))
}

/// In-progress rendering: the raw buffer as escaped literal text
pub fn render_streaming(buffer: &str) -> String {
    escape_html(buffer)
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
