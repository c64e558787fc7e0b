use crate::models::Extraction;
use crate::publication::ExtractionConfig;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static EMPHASIS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\*\*|\*|__|_|`)").unwrap());

// The title is either separated from the marker by blanks or starts right
// after it with something other than `#`, so `##` or `#\t` never yields a
// title made of a stray hash or whitespace.
static HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}(?:[ \t]+(\S.*)|([^\s#].*))$").unwrap());

/// Runs every field pass over the same markdown.
pub fn extract(text: &str, config: &ExtractionConfig) -> Extraction {
    Extraction {
        date: extract_date(text, config),
        headers: extract_headers(text, config),
        body: derive_body(text, config),
    }
}

/// Removes bold, italic and inline-code markers.
pub fn strip_emphasis(text: &str) -> Cow<'_, str> {
    EMPHASIS_REGEX.replace_all(text, "")
}

/// First substring matching the publication's date pattern, searched in the
/// text with emphasis markers removed.
pub fn extract_date(text: &str, config: &ExtractionConfig) -> Option<String> {
    let clean = strip_emphasis(text);
    config
        .date_regex()
        .find(&clean)
        .map(|m| m.as_str().to_string())
}

fn heading_title<'h>(c: &Captures<'h>) -> &'h str {
    c.get(1)
        .or_else(|| c.get(2))
        .map_or("", |m| m.as_str().trim())
}

/// Heading titles in document order, minus those naming an ignore keyword.
pub fn extract_headers(text: &str, config: &ExtractionConfig) -> Vec<String> {
    HEADER_REGEX
        .captures_iter(text)
        .map(|c| heading_title(&c))
        .filter(|title| !config.is_ignored(title))
        .map(str::to_string)
        .collect()
}

/// The document with every heading line swapped for the placeholder, or
/// dropped entirely when its title is ignored.
pub fn derive_body(text: &str, config: &ExtractionConfig) -> String {
    let replaced = HEADER_REGEX.replace_all(text, |c: &Captures| {
        if config.is_ignored(heading_title(c)) {
            ""
        } else {
            config.header_placeholder()
        }
    });
    replaced.trim().to_string()
}
