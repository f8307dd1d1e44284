//! Optional zip archive of the finished output folder.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::layout::archive_path;

pub trait Archiver {
    /// Writes `<folder-name>.zip` beside `folder` and returns its path.
    fn archive(&self, folder: &Path) -> Result<PathBuf>;
}

/// Shells out to the `zip` utility.
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    program: PathBuf,
}

impl ZipArchiver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, folder: &Path) -> Result<PathBuf> {
        let parent = folder
            .parent()
            .with_context(|| format!("{} has no parent directory", folder.display()))?;
        let name = folder
            .file_name()
            .with_context(|| format!("{} has no folder name", folder.display()))?;
        let target = archive_path(folder);
        let mut archive_name = name.to_os_string();
        archive_name.push(".zip");

        let mut command = Command::new(&self.program);
        command
            .current_dir(parent)
            .arg("-r")
            .arg("-q")
            .arg(&archive_name)
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        tracing::debug!(?command, "running archiver");

        let output = command
            .output()
            .with_context(|| format!("running {}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "{} exited with status {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if !target.is_file() {
            bail!("archiver reported success but {} is missing", target.display());
        }
        Ok(target)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn install_zip_stub(dir: &Path, exit_code: i32) -> Result<PathBuf> {
        let script_path = dir.join("zip");
        let script = format!(
            r#"#!/usr/bin/env bash
set -eu
if [[ {exit_code} -ne 0 ]]; then
  echo "zip error: nothing to do" >&2
  exit {exit_code}
fi
# zip -r -q <archive> <folder>
printf '%s\n' "$4" > "$3"
"#
        );
        fs::write(&script_path, script)?;
        let mut perms = fs::metadata(&script_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms)?;
        Ok(script_path)
    }

    #[test]
    fn writes_sibling_archive() -> Result<()> {
        let dir = tempdir()?;
        let bin = tempdir()?;
        let folder = dir.path().join("audio__song");
        fs::create_dir_all(&folder)?;
        let archiver = ZipArchiver::new(install_zip_stub(bin.path(), 0)?);

        let archive = archiver.archive(&folder)?;
        assert_eq!(archive, dir.path().join("audio__song.zip"));
        assert_eq!(fs::read_to_string(&archive)?.trim(), "audio__song");
        Ok(())
    }

    #[test]
    fn non_zero_exit_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let bin = tempdir()?;
        let folder = dir.path().join("audio__song");
        fs::create_dir_all(&folder)?;
        let archiver = ZipArchiver::new(install_zip_stub(bin.path(), 12)?);

        let err = archiver.archive(&folder).unwrap_err();
        assert!(err.to_string().contains("nothing to do"));
        Ok(())
    }

    #[test]
    fn missing_program_is_reported() {
        let dir = tempdir().unwrap();
        let archiver = ZipArchiver::new(dir.path().join("no-such-zip"));
        let err = archiver.archive(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("running"));
    }
}
