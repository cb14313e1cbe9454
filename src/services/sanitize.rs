//! HTML sanitization
//!
//! Remote gist bodies and user-supplied text pass through here before they
//! reach a template. `clean_html` keeps an allowlist of formatting tags;
//! `strip` reduces a string to plain text for titles, summaries and bios.

use std::collections::HashSet;

use ammonia::Builder;

/// Tags allowed in rendered article bodies
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "del", "em", "h1", "h2", "h3", "h4", "h5",
    "h6", "hr", "i", "img", "li", "ol", "p", "pre", "strike", "strong", "table", "tbody", "td",
    "th", "thead", "tr", "ul", "br", "sup", "sub", "input",
];

/// Per-tag attribute allowlist
const ALLOWED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title"]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("input", &["type", "checked", "disabled"]),
    ("td", &["align"]),
    ("th", &["align"]),
];

/// HTML sanitizer with a fixed allowlist
#[derive(Clone)]
pub struct Sanitizer;

impl Sanitizer {
    /// Create a sanitizer
    pub fn new() -> Self {
        Self
    }

    fn builder() -> Builder<'static> {
        let mut builder = Builder::default();
        builder.tags(HashSet::from_iter(ALLOWED_TAGS.iter().copied()));
        for (tag, attributes) in ALLOWED_ATTRIBUTES {
            builder.add_tag_attributes(tag, attributes.iter().copied());
        }
        builder
    }

    /// Sanitize rendered article HTML, keeping allowed formatting tags
    pub fn clean_html(&self, html: &str) -> String {
        Self::builder().clean(html).to_string()
    }

    /// Strip all markup, leaving plain text
    pub fn strip(&self, text: &str) -> String {
        let mut builder = Builder::default();
        builder.tags(HashSet::new());
        builder.clean(text).to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}
