//! Per-run options, built once from the command line.

use clap::ValueEnum;
use std::fmt;
use std::path::PathBuf;

use crate::error::RunError;

pub const DEFAULT_QUALITY: u16 = 192;
pub const MAX_QUALITY: u16 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Flac,
    Wav,
    Opus,
}

impl AudioFormat {
    /// File extension, also the value passed to `--audio-format`.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Opus => "opus",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub url: String,
    pub output_dir: PathBuf,
    pub quality: u16,
    pub format: AudioFormat,
    pub embed_metadata: bool,
    pub keep_video: bool,
    pub compress: bool,
}

impl RunConfig {
    /// Defaults for everything but the target: current directory, 192 kbps
    /// mp3 with embedded metadata, no video, no archive.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_dir: PathBuf::from("."),
            quality: DEFAULT_QUALITY,
            format: AudioFormat::default(),
            embed_metadata: true,
            keep_video: false,
            compress: false,
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.quality > MAX_QUALITY {
            return Err(RunError::Usage(format!(
                "quality must be at most {MAX_QUALITY} kbps, got {}",
                self.quality
            )));
        }
        if self.url.trim().is_empty() {
            return Err(RunError::Usage("a YouTube URL is required".into()));
        }
        Ok(())
    }
}
