//! Filesystem-safe tokens derived from video titles.

use chrono::{DateTime, Local, TimeZone};

/// Returned when the input contains nothing usable.
pub const EMPTY_TOKEN: &str = "untitled";
const TIMESTAMP_SUFFIX_FORMAT: &str = "%A_%Y_%m_%d_%H_%M_%S";

/// Maps arbitrary text to a lowercase token over `[a-z0-9_]`.
///
/// Anything that is not an ASCII letter or digit (reserved path characters,
/// whitespace, punctuation, non-ASCII) becomes `_`, runs of `_` collapse to a
/// single one, and leading/trailing `_` or `-` are trimmed. Applying it twice
/// gives the same result as applying it once.
pub fn sanitize_filename(text: &str) -> String {
    let mut token = String::with_capacity(text.len());
    for c in text.chars() {
        let mapped = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' && token.ends_with('_') {
            continue;
        }
        token.push(mapped);
    }

    let trimmed = token.trim_matches(|c| c == '_' || c == '-');
    if trimmed.is_empty() {
        EMPTY_TOKEN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized title followed by the current local weekday, date and time, so
/// repeated runs on the same video never collide.
pub fn sanitize_with_timestamp(text: &str) -> String {
    sanitize_with_timestamp_at(text, Local::now())
}

pub fn sanitize_with_timestamp_at<Tz>(text: &str, at: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let suffix = at.format(TIMESTAMP_SUFFIX_FORMAT);
    sanitize_filename(&format!("{}_{}", sanitize_filename(text), suffix))
}
