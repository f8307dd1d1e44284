//! yt-dlp backed implementations of [`MetadataSource`] and
//! [`MediaExtractor`].
//!
//! Every invocation is a plain blocking subprocess. Queries capture stdout;
//! downloads stream stdout line by line into the run log so the user sees
//! yt-dlp's progress as it happens.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::config::ToolSettings;
use crate::error::RunError;
use crate::extract::{AudioRequest, MediaExtractor};
use crate::format::duration_from_seconds;
use crate::logging::RunLog;
use crate::metadata::{MetadataSource, VideoDetails, normalize_field};

const YT_DLP_INSTALL_HINT: &str = "pip install -U yt-dlp";
const FFMPEG_INSTALL_HINT: &str = "apt install ffmpeg (or brew install ffmpeg)";
const STDERR_TAIL_LINES: usize = 5;

/// Subset of `yt-dlp --dump-single-json` used for the report. Everything is
/// optional because older or restricted videos may lack any of it.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    duration: Option<f64>,
    duration_string: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    view_count: Option<i64>,
    upload_date: Option<String>,
    description: Option<String>,
}

impl From<VideoInfo> for VideoDetails {
    fn from(info: VideoInfo) -> Self {
        let duration = info
            .duration_string
            .as_deref()
            .and_then(normalize_field)
            .or_else(|| info.duration.map(|secs| duration_from_seconds(secs.round() as i64)));
        VideoDetails {
            duration,
            uploader: info
                .uploader
                .as_deref()
                .and_then(normalize_field)
                .or_else(|| info.channel.as_deref().and_then(normalize_field)),
            view_count: info.view_count.map(|views| views.to_string()),
            upload_date: info.upload_date.as_deref().and_then(normalize_field),
            description: info.description.as_deref().and_then(normalize_field),
        }
    }
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    ffmpeg: PathBuf,
    ffmpeg_location: Option<PathBuf>,
    concurrent_fragments: u8,
    rate_limit: String,
    video_max_height: u32,
}

impl YtDlp {
    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self {
            program: settings.yt_dlp.clone(),
            ffmpeg: settings.ffmpeg.clone(),
            ffmpeg_location: settings.custom_ffmpeg().map(Path::to_path_buf),
            concurrent_fragments: settings.concurrent_fragments,
            rate_limit: settings.rate_limit.clone(),
            video_max_height: settings.video_max_height,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(location) = &self.ffmpeg_location {
            command.arg("--ffmpeg-location").arg(location);
        }
        command
    }

    /// Runs a metadata query and returns the first non-placeholder line.
    fn query(&self, mut command: Command, label: &str) -> Result<Option<String>> {
        tracing::debug!(?command, "running yt-dlp query");
        let output = command
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("running {} for {label}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "{label} query failed (status {}): {}",
                output.status,
                stderr_tail(&String::from_utf8_lossy(&output.stderr))
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().find_map(normalize_field))
    }

    fn audio_command(&self, request: &AudioRequest<'_>) -> Command {
        let mut command = self.command();
        command
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(request.format.extension())
            .arg("--audio-quality")
            .arg(format!("{}K", request.quality))
            .arg("--concurrent-fragments")
            .arg(self.concurrent_fragments.to_string())
            .arg("--limit-rate")
            .arg(&self.rate_limit)
            .arg("--no-overwrites")
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--output")
            .arg(request.output_template());

        if request.embed_metadata {
            command.arg("--embed-thumbnail").arg("--embed-metadata");
        } else {
            command.arg("--no-embed-thumbnail").arg("--no-embed-metadata");
        }

        command.arg(request.url);
        command
    }

    fn thumbnail_command(&self, url: &str, output_template: &Path) -> Command {
        let mut command = self.command();
        command
            .arg("--skip-download")
            .arg("--write-thumbnail")
            .arg("--convert-thumbnails")
            .arg("png")
            .arg("--no-overwrites")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--output")
            .arg(output_template)
            .arg(url);
        command
    }

    fn video_command(&self, url: &str, output_template: &Path) -> Command {
        let height = self.video_max_height;
        let mut command = self.command();
        command
            .arg("--format")
            .arg(format!(
                "bestvideo[height<={height}]+bestaudio/best[height<={height}]"
            ))
            .arg("--concurrent-fragments")
            .arg(self.concurrent_fragments.to_string())
            .arg("--no-overwrites")
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--output")
            .arg(output_template)
            .arg(url);
        command
    }

    /// Runs a download, echoing each stdout line as progress. Stderr is
    /// drained on a helper thread so a chatty tool cannot block on a full
    /// pipe; its tail is attached to the error when the exit status is bad.
    fn run_streaming(&self, mut command: Command, label: &str, log: &RunLog) -> Result<()> {
        tracing::debug!(?command, "running yt-dlp download");
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("starting {} for {label}", self.program.display()))?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = stderr.read_to_end(&mut buffer);
                String::from_utf8_lossy(&buffer).into_owned()
            })
        });

        let relayed = match child.stdout.take() {
            Some(stdout) => relay_progress(stdout, log),
            None => Ok(()),
        };
        if let Err(err) = relayed {
            // The child must not outlive a failed relay.
            let _ = child.kill();
            let _ = child.wait();
            if let Some(handle) = stderr_reader {
                let _ = handle.join();
            }
            return Err(err).with_context(|| format!("reading {label} output"));
        }

        let status = child
            .wait()
            .with_context(|| format!("waiting for {label} to finish"))?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !stderr.trim().is_empty() {
            log.note(format!("{label} stderr: {}", stderr.trim()));
        }

        if !status.success() {
            bail!(
                "{label} exited with status {status}: {}",
                stderr_tail(&stderr)
            );
        }
        Ok(())
    }
}

impl MetadataSource for YtDlp {
    fn title(&self, url: &str) -> Result<Option<String>> {
        let mut command = self.command();
        command
            .arg("--get-title")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(url);
        self.query(command, "title")
    }

    fn title_from_template(&self, url: &str) -> Result<Option<String>> {
        let mut command = self.command();
        command
            .arg("--get-filename")
            .arg("--output")
            .arg("%(title)s")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(url);
        self.query(command, "filename template")
    }

    fn details(&self, url: &str) -> Result<VideoDetails> {
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(url)
            .stdin(Stdio::null());
        tracing::debug!(?command, "running yt-dlp details query");

        let output = command
            .output()
            .with_context(|| format!("fetching metadata for {url}"))?;
        if !output.status.success() {
            bail!(
                "metadata command failed for {url} (status {}): {}",
                output.status,
                stderr_tail(&String::from_utf8_lossy(&output.stderr))
            );
        }
        let raw_json =
            String::from_utf8(output.stdout).context("parsing metadata JSON response as UTF-8")?;
        let info: VideoInfo =
            serde_json::from_str(&raw_json).context("deserializing metadata JSON")?;
        Ok(info.into())
    }
}

impl MediaExtractor for YtDlp {
    fn check_available(&self) -> Result<(), RunError> {
        ensure_program_available(&self.program, "--version").map_err(|reason| {
            RunError::DependencyMissing {
                tool: self.program.display().to_string(),
                reason,
                hint: YT_DLP_INSTALL_HINT.to_string(),
            }
        })?;
        ensure_program_available(&self.ffmpeg, "-version").map_err(|reason| {
            RunError::DependencyMissing {
                tool: self.ffmpeg.display().to_string(),
                reason,
                hint: FFMPEG_INSTALL_HINT.to_string(),
            }
        })
    }

    fn extract_audio(&self, request: &AudioRequest<'_>, log: &RunLog) -> Result<()> {
        self.run_streaming(self.audio_command(request), "audio extraction", log)
    }

    fn fetch_thumbnail(&self, url: &str, output_template: &Path, log: &RunLog) -> Result<()> {
        self.run_streaming(
            self.thumbnail_command(url, output_template),
            "thumbnail download",
            log,
        )
    }

    fn fetch_video(&self, url: &str, output_template: &Path, log: &RunLog) -> Result<()> {
        self.run_streaming(self.video_command(url, output_template), "video download", log)
    }
}

/// Echoes each stdout line as progress. Lines are decoded lossily because
/// titles in yt-dlp's output are not guaranteed to be valid UTF-8.
fn relay_progress(stdout: impl Read, log: &RunLog) -> std::io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end();
        if !line.is_empty() {
            log.progress(line);
        }
    }
}

/// Runs `<program> <version_flag>` with silenced output to fail loudly when a
/// dependency is missing.
fn ensure_program_available(program: &Path, version_flag: &str) -> Result<(), String> {
    let status = Command::new(program)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!("it returned a failure status ({status})")),
        Err(err) => Err(format!("not installed or not in PATH: {err}")),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
