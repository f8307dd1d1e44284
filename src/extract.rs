//! Media extraction seam and output-file resolution.
//!
//! The extractor reports success through its exit status only. The files it
//! writes are then located here, because its own filename sanitization can
//! diverge from ours.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::RunError;
use crate::logging::RunLog;
use crate::options::AudioFormat;

/// Suffixes the extractor uses for in-flight downloads.
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp"];

/// Stem the thumbnail is downloaded under before being renamed.
pub const THUMBNAIL_DOWNLOAD_STEM: &str = "thumbnail_download";

#[derive(Debug, Clone)]
pub struct AudioRequest<'a> {
    pub url: &'a str,
    pub folder: &'a Path,
    pub file_stem: &'a str,
    pub format: AudioFormat,
    pub quality: u16,
    pub embed_metadata: bool,
}

impl AudioRequest<'_> {
    /// Output template handed to the extractor (`<folder>/<stem>.%(ext)s`).
    pub fn output_template(&self) -> PathBuf {
        output_template(self.folder, self.file_stem)
    }

    pub fn expected_path(&self) -> PathBuf {
        self.folder
            .join(format!("{}.{}", self.file_stem, self.format.extension()))
    }
}

pub fn output_template(folder: &Path, stem: &str) -> PathBuf {
    folder.join(format!("{stem}.%(ext)s"))
}

/// Everything the pipeline needs from the external download tool.
pub trait MediaExtractor {
    /// Fails with `DependencyMissing` when a required binary is absent.
    fn check_available(&self) -> Result<(), RunError>;

    /// Audio-only download and transcode. `Err` means the tool failed.
    fn extract_audio(&self, request: &AudioRequest<'_>, log: &RunLog) -> Result<()>;

    /// Thumbnail-only fetch, converted to PNG, written to `output_template`.
    fn fetch_thumbnail(&self, url: &str, output_template: &Path, log: &RunLog) -> Result<()>;

    /// Best-quality video capped at the configured height.
    fn fetch_video(&self, url: &str, output_template: &Path, log: &RunLog) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The file sits exactly where we asked the extractor to put it.
    Exact(PathBuf),
    /// Found by extension inside the output folder.
    Fallback(PathBuf),
    NotFound,
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Exact(path) | Resolution::Fallback(path) => Some(path),
            Resolution::NotFound => None,
        }
    }
}

/// Two-phase lookup of the extracted audio: the exact expected path first,
/// then any `*.<extension>` directly inside `folder` (first in name order).
/// Never looks outside `folder`.
pub fn resolve_output(folder: &Path, stem: &str, extension: &str) -> Resolution {
    let expected = folder.join(format!("{stem}.{extension}"));
    if expected.is_file() {
        return Resolution::Exact(expected);
    }

    folder_files(folder)
        .into_iter()
        .find(|path| has_extension(path, extension))
        .map(Resolution::Fallback)
        .unwrap_or(Resolution::NotFound)
}

/// Finds the kept original video: a file named `<stem>.<ext>` whose extension
/// is not one already claimed by the audio, thumbnail or report outputs.
pub fn locate_video(folder: &Path, stem: &str, claimed_extensions: &[&str]) -> Option<PathBuf> {
    folder_files(folder).into_iter().find(|path| {
        let stem_matches = path.file_stem().is_some_and(|value| value == stem);
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        stem_matches
            && !claimed_extensions
                .iter()
                .any(|claimed| ext.eq_ignore_ascii_case(claimed))
    })
}

/// Renames the PNG produced under [`THUMBNAIL_DOWNLOAD_STEM`] to `target`.
pub fn finalize_thumbnail(folder: &Path, target: &Path) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = folder_files(folder)
        .into_iter()
        .filter(|path| {
            path.file_stem()
                .is_some_and(|stem| stem == THUMBNAIL_DOWNLOAD_STEM)
        })
        .collect();

    let Some(png) = candidates.iter().find(|path| has_extension(path, "png")) else {
        match candidates.first() {
            Some(other) => bail!(
                "thumbnail was saved as {} instead of png",
                other.display()
            ),
            None => bail!("no thumbnail file was produced in {}", folder.display()),
        }
    };

    fs::rename(png, target)
        .with_context(|| format!("renaming {} to {}", png.display(), target.display()))?;
    Ok(target.to_path_buf())
}

/// Regular files directly inside `folder`, sorted by name, with in-flight
/// downloads skipped.
fn folder_files(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            !PARTIAL_EXTENSIONS
                .iter()
                .any(|partial| has_extension(path, partial))
        })
        .collect()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
