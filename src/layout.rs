//! Output folder layout.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const FOLDER_PREFIX: &str = "audio__";
pub const REPORT_FILE: &str = "metadata.md";
pub const THUMBNAIL_SUFFIX: &str = "_thumbnail";
pub const THUMBNAIL_EXT: &str = "png";

pub fn folder_name(sanitized_title: &str) -> String {
    format!("{FOLDER_PREFIX}{sanitized_title}")
}

/// Creates `<target_dir>/audio__<sanitized_title>` (parents included) and
/// returns its absolute path. An existing folder is reused as-is.
pub fn build_output_folder(target_dir: &Path, sanitized_title: &str) -> Result<PathBuf> {
    let folder = target_dir.join(folder_name(sanitized_title));
    fs::create_dir_all(&folder).with_context(|| format!("creating {}", folder.display()))?;
    fs::canonicalize(&folder).with_context(|| format!("resolving {}", folder.display()))
}

pub fn thumbnail_path(folder: &Path, sanitized_title: &str) -> PathBuf {
    folder.join(format!("{sanitized_title}{THUMBNAIL_SUFFIX}.{THUMBNAIL_EXT}"))
}

pub fn report_path(folder: &Path) -> PathBuf {
    folder.join(REPORT_FILE)
}

/// `<parent>/<folder-name>.zip`, beside the folder it archives.
pub fn archive_path(folder: &Path) -> PathBuf {
    let mut name = folder
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".zip");
    folder.with_file_name(name)
}
