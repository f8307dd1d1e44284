//! Video metadata gathered before the download starts.
//!
//! The title drives every file name the run produces, so it gets a primary
//! query, a secondary filename-template query, and finally a synthetic
//! timestamp title. The remaining fields are informational: each one may be
//! missing and a failed lookup only produces a warning.

use anyhow::Result;
use chrono::{DateTime, Local};
use regex::Regex;
use std::sync::LazyLock;

use crate::format::{UNKNOWN, format_date, format_duration, format_number};
use crate::logging::RunLog;

pub const DESCRIPTION_SNIPPET_CHARS: usize = 500;
const FALLBACK_TITLE_FORMAT: &str = "audio_%Y%m%d_%H%M%S";
/// How yt-dlp prefixes its own diagnostics. Case and colon matter: titles
/// such as "Warning Signs" are legitimate.
const TOOL_MESSAGE_PREFIXES: &[&str] = &["ERROR: ", "WARNING: "];

// Scheme/host/query debris that sometimes leaks into extracted titles.
static URL_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:https?://\S*|www\.\S*|\b(?:music\.|m\.)?youtube\.com\S*|\byoutu\.be\S*|\bwatch\?\S*|[?&](?:v|list|si|t|feature|index|pp)=\S*)",
    )
    .expect("URL fragment pattern is valid")
});

/// Lookup backend for video metadata. The pipeline only talks to this trait,
/// so tests can swap the yt-dlp implementation for an in-memory one.
pub trait MetadataSource {
    /// Primary title lookup.
    fn title(&self, url: &str) -> Result<Option<String>>;

    /// Secondary title lookup through the extractor's output-filename
    /// template, used when the primary answer is unusable.
    fn title_from_template(&self, url: &str) -> Result<Option<String>>;

    /// Everything except the title. Individual fields may be absent.
    fn details(&self, url: &str) -> Result<VideoDetails>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoDetails {
    pub duration: Option<String>,
    pub uploader: Option<String>,
    pub view_count: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub title_is_fallback: bool,
    pub duration: Option<String>,
    pub duration_text: String,
    pub uploader: Option<String>,
    pub view_count: Option<String>,
    pub view_count_text: String,
    pub upload_date: Option<String>,
    pub upload_date_text: String,
    pub description: Option<String>,
}

impl VideoMetadata {
    pub fn from_parts(title: String, title_is_fallback: bool, details: VideoDetails) -> Self {
        let duration_text = format_duration(details.duration.as_deref().unwrap_or(""));
        let view_count_text = format_number(details.view_count.as_deref().unwrap_or(""));
        let upload_date_text = format_date(details.upload_date.as_deref().unwrap_or(""));
        Self {
            title,
            title_is_fallback,
            duration: details.duration,
            duration_text,
            uploader: details.uploader,
            view_count: details.view_count,
            view_count_text,
            upload_date: details.upload_date,
            upload_date_text,
            description: details.description.map(|text| description_snippet(&text)),
        }
    }

    pub fn uploader_text(&self) -> &str {
        self.uploader.as_deref().unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone)]
pub struct FetchedMetadata {
    pub metadata: VideoMetadata,
    /// Recovered problems (fallback title, missing details).
    pub warnings: Vec<String>,
}

pub fn fetch_metadata(source: &dyn MetadataSource, url: &str, log: &RunLog) -> FetchedMetadata {
    fetch_metadata_at(source, url, log, Local::now())
}

pub fn fetch_metadata_at(
    source: &dyn MetadataSource,
    url: &str,
    log: &RunLog,
    now: DateTime<Local>,
) -> FetchedMetadata {
    let mut warnings = Vec::new();

    log.info("Fetching video title...");
    let title = match source.title(url) {
        Ok(candidate) => usable_title(candidate, url),
        Err(err) => {
            log.note(format!("primary title query failed: {err:#}"));
            None
        }
    };
    let title = title.or_else(|| {
        log.info("Primary title lookup returned nothing usable, trying filename template...");
        match source.title_from_template(url) {
            Ok(candidate) => usable_title(candidate, url),
            Err(err) => {
                log.note(format!("template title query failed: {err:#}"));
                None
            }
        }
    });

    let (title, title_is_fallback) = match title {
        Some(title) => (title, false),
        None => {
            let fallback = now.format(FALLBACK_TITLE_FORMAT).to_string();
            let message = format!("Could not extract the video title, using {fallback}");
            log.warn(&message);
            warnings.push(message);
            (fallback, true)
        }
    };
    log.success(format!("Title: {title}"));

    log.info("Fetching video details...");
    let details = match source.details(url) {
        Ok(details) => details,
        Err(err) => {
            let message = format!("Could not fetch video details: {err:#}");
            log.warn(&message);
            warnings.push(message);
            VideoDetails::default()
        }
    };

    let metadata = VideoMetadata::from_parts(title, title_is_fallback, details);
    log.info(format!("Duration: {}", metadata.duration_text));
    log.info(format!("Uploader: {}", metadata.uploader_text()));
    log.info(format!("Views: {}", metadata.view_count_text));
    log.info(format!("Upload date: {}", metadata.upload_date_text));

    FetchedMetadata { metadata, warnings }
}

/// Trims the raw field value and maps yt-dlp's placeholders to `None`.
pub fn normalize_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "NA" || trimmed == "None" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn usable_title(candidate: Option<String>, url: &str) -> Option<String> {
    let raw = candidate?;
    let raw = raw.lines().next().unwrap_or_default().trim();
    if raw.is_empty() || looks_like_error_or_echo(raw, url) {
        return None;
    }
    let cleaned = clean_title(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn looks_like_error_or_echo(text: &str, url: &str) -> bool {
    if TOOL_MESSAGE_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
        || text == "NA"
    {
        return true;
    }
    if text == url.trim() {
        return true;
    }
    let lower = text.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && !text.contains(char::is_whitespace)
}

/// Removes URL fragments from an extracted title and tidies the whitespace
/// and separators left behind.
pub fn clean_title(raw: &str) -> String {
    let stripped = URL_FRAGMENT.replace_all(raw, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '|' | ':' | '/'))
        .to_string()
}

fn description_snippet(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.char_indices();
    match chars.nth(DESCRIPTION_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
