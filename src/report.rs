//! `metadata.md` renderer.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::format::{UNKNOWN, format_size};
use crate::layout::{REPORT_FILE, report_path};
use crate::metadata::VideoMetadata;
use crate::options::RunConfig;

const NOT_DOWNLOADED: &str = "Not downloaded";
const PROCESSED_AT_FORMAT: &str = "%A, %d %B %Y %H:%M:%S";

/// Inputs for one report. Paths are whatever the run managed to produce.
#[derive(Debug)]
pub struct ReportContext<'a> {
    pub config: &'a RunConfig,
    pub metadata: &'a VideoMetadata,
    pub folder: &'a Path,
    pub audio: &'a Path,
    pub video: Option<&'a Path>,
    pub processed_at: DateTime<Local>,
}

/// Renders the report and writes it to `<folder>/metadata.md`.
pub fn write_report(context: &ReportContext<'_>) -> Result<PathBuf> {
    let path = report_path(context.folder);
    let body = render_report(context);
    fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn render_report(context: &ReportContext<'_>) -> String {
    let metadata = context.metadata;
    let config = context.config;
    let mut out = String::new();

    let _ = writeln!(out, "# {}", metadata.title);
    out.push('\n');

    out.push_str("## Video Information\n\n");
    let title_note = if metadata.title_is_fallback {
        " (title could not be extracted)"
    } else {
        ""
    };
    let _ = writeln!(out, "- **Title:** {}{title_note}", metadata.title);
    let _ = writeln!(out, "- **Duration:** {}", metadata.duration_text);
    let _ = writeln!(out, "- **Uploader:** {}", metadata.uploader_text());
    let _ = writeln!(out, "- **Views:** {}", metadata.view_count_text);
    let _ = writeln!(out, "- **Upload Date:** {}", metadata.upload_date_text);
    let _ = writeln!(out, "- **Source URL:** {}", config.url);
    out.push('\n');

    out.push_str("## Audio\n\n");
    let _ = writeln!(out, "- **Format:** {}", config.format.extension().to_uppercase());
    let _ = writeln!(out, "- **Quality:** {} kbps", config.quality);
    let _ = writeln!(
        out,
        "- **Metadata Embedded:** {}",
        if config.embed_metadata { "Yes" } else { "No" }
    );
    let _ = writeln!(out, "- **File Size:** {}", file_size_text(Some(context.audio)));
    out.push('\n');

    out.push_str("## Video\n\n");
    match context.video {
        Some(video) => {
            let _ = writeln!(out, "- **File Size:** {}", file_size_text(Some(video)));
        }
        None => {
            let _ = writeln!(out, "- **File Size:** {NOT_DOWNLOADED}");
        }
    }
    out.push('\n');

    if let Some(description) = &metadata.description {
        out.push_str("## Description\n\n");
        let _ = writeln!(out, "{description}");
        out.push('\n');
    }

    out.push_str("## Processing\n\n");
    let _ = writeln!(
        out,
        "- **Processed:** {}",
        context.processed_at.format(PROCESSED_AT_FORMAT)
    );
    out.push('\n');

    out.push_str("## Files\n\n");
    for name in listed_files(context.folder) {
        let _ = writeln!(out, "- {name}");
    }

    out
}

fn file_size_text(path: Option<&Path>) -> String {
    path.and_then(|path| fs::metadata(path).ok())
        .map(|meta| format_size(meta.len()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Every file under the output folder (relative paths, sorted), plus the
/// report itself, which is written right after rendering.
fn listed_files(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(folder)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(folder)
                .ok()
                .map(|relative| relative.to_string_lossy().into_owned())
        })
        .collect();
    if !names.iter().any(|name| name == REPORT_FILE) {
        names.push(REPORT_FILE.to_string());
        names.sort();
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::VideoDetails;
    use crate::options::AudioFormat;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_metadata() -> VideoMetadata {
        VideoMetadata::from_parts(
            "Never Gonna Give You Up".into(),
            false,
            VideoDetails {
                duration: Some("3:33".into()),
                uploader: Some("Rick Astley".into()),
                view_count: Some("1234567".into()),
                upload_date: Some("20091025".into()),
                description: Some("The official video.".into()),
            },
        )
    }

    #[test]
    fn report_contains_every_section() -> Result<()> {
        let dir = tempdir()?;
        let audio = dir.path().join("song.mp3");
        fs::write(&audio, vec![0u8; 2048])?;
        fs::write(dir.path().join("song_thumbnail.png"), "png")?;
        let mut config = RunConfig::new("https://youtu.be/dQw4w9WgXcQ");
        config.format = AudioFormat::Flac;
        config.quality = 320;
        let metadata = sample_metadata();
        let processed_at = Local.with_ymd_and_hms(2025, 1, 15, 10, 4, 5).unwrap();

        let path = write_report(&ReportContext {
            config: &config,
            metadata: &metadata,
            folder: dir.path(),
            audio: &audio,
            video: None,
            processed_at,
        })?;
        assert_eq!(path, dir.path().join("metadata.md"));

        let report = fs::read_to_string(&path)?;
        assert!(report.starts_with("# Never Gonna Give You Up\n"));
        assert!(report.contains("- **Duration:** 3m 33s"));
        assert!(report.contains("- **Uploader:** Rick Astley"));
        assert!(report.contains("- **Views:** 1,234,567"));
        assert!(report.contains("- **Upload Date:** Sunday, 25th October 2009"));
        assert!(report.contains("- **Source URL:** https://youtu.be/dQw4w9WgXcQ"));
        assert!(report.contains("- **Format:** FLAC"));
        assert!(report.contains("- **Quality:** 320 kbps"));
        assert!(report.contains("- **Metadata Embedded:** Yes"));
        assert!(report.contains("- **File Size:** 2.0 KB"));
        assert!(report.contains("- **File Size:** Not downloaded"));
        assert!(report.contains("The official video."));
        assert!(report.contains("- **Processed:** Wednesday, 15 January 2025 10:04:05"));
        assert!(report.contains("- metadata.md\n- song.mp3\n- song_thumbnail.png\n"));
        Ok(())
    }

    #[test]
    fn kept_video_size_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let audio = dir.path().join("song.mp3");
        let video = dir.path().join("song.webm");
        fs::write(&audio, "a")?;
        fs::write(&video, vec![0u8; 3 * 1024 * 1024])?;
        let mut config = RunConfig::new("https://youtu.be/x");
        config.embed_metadata = false;
        let metadata = sample_metadata();

        let report = render_report(&ReportContext {
            config: &config,
            metadata: &metadata,
            folder: dir.path(),
            audio: &audio,
            video: Some(&video),
            processed_at: Local::now(),
        });
        assert!(report.contains("- **File Size:** 3.0 MB"));
        assert!(report.contains("- **Metadata Embedded:** No"));
        assert!(!report.contains(NOT_DOWNLOADED));
        Ok(())
    }
}
