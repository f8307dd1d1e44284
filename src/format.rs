//! Human-readable renderings used by the metadata report.

use chrono::{Datelike, NaiveDate};

pub const UNKNOWN: &str = "Unknown";

/// `H:MM:SS` becomes `"<H>h <MM>m <SS>s"`, `MM:SS` becomes `"<MM>m <SS>s"`,
/// anything else is passed through. Empty input is `"Unknown"`.
pub fn format_duration(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return UNKNOWN.to_string();
    }
    let parts: Vec<&str> = raw.split(':').collect();
    let numeric = parts
        .iter()
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !numeric {
        return raw.to_string();
    }
    match parts.as_slice() {
        [hours, minutes, seconds] => format!("{hours}h {minutes}m {seconds}s"),
        [minutes, seconds] => format!("{minutes}m {seconds}s"),
        _ => raw.to_string(),
    }
}

/// Renders a duration in seconds the way yt-dlp's `duration_string` does:
/// `H:MM:SS`, or `M:SS` for clips under an hour.
pub fn duration_from_seconds(duration: i64) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Groups thousands with commas: `"1234567"` → `"1,234,567"`.
pub fn format_number(raw: &str) -> String {
    let digits = raw.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return UNKNOWN.to_string();
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return "0".to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, c) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Turns yt-dlp's `YYYYMMDD` upload date into e.g.
/// `"Wednesday, 15th January 2025"`.
pub fn format_date(raw: &str) -> String {
    parse_upload_date(raw)
        .map(|date| {
            format!(
                "{}, {}{} {}",
                date.format("%A"),
                date.day(),
                ordinal_suffix(date.day()),
                date.format("%B %Y"),
            )
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_upload_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = raw[0..4].parse().ok()?;
    let month = raw[4..6].parse().ok()?;
    let day = raw[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Binary-prefixed size, e.g. `"4.2 MB"`; sizes below 1 KiB stay in bytes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
