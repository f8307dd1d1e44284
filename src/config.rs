#![forbid(unsafe_code)]

//! External tool settings.
//!
//! Values are layered: explicit overrides, then the process environment, then
//! an optional `.env` file in the working directory, then built-in defaults.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
pub const DEFAULT_ZIP_BIN: &str = "zip";
pub const DEFAULT_CONCURRENT_FRAGMENTS: u8 = 4;
pub const DEFAULT_RATE_LIMIT: &str = "10M";
pub const DEFAULT_VIDEO_MAX_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub zip: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub concurrent_fragments: u8,
    pub rate_limit: String,
    pub video_max_height: u32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            yt_dlp: PathBuf::from(DEFAULT_YT_DLP_BIN),
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG_BIN),
            zip: PathBuf::from(DEFAULT_ZIP_BIN),
            log_dir: None,
            concurrent_fragments: DEFAULT_CONCURRENT_FRAGMENTS,
            rate_limit: DEFAULT_RATE_LIMIT.to_string(),
            video_max_height: DEFAULT_VIDEO_MAX_HEIGHT,
        }
    }
}

impl ToolSettings {
    /// True when ffmpeg was pointed somewhere other than `$PATH`, in which
    /// case yt-dlp must be told where to find it.
    pub fn custom_ffmpeg(&self) -> Option<&Path> {
        if self.ffmpeg == Path::new(DEFAULT_FFMPEG_BIN) {
            None
        } else {
            Some(&self.ffmpeg)
        }
    }
}

pub fn load_tool_settings() -> Result<ToolSettings> {
    resolve_tool_settings(ToolOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub yt_dlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub zip: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_tool_settings(overrides: ToolOverrides) -> Result<ToolSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_tool_settings_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_tool_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> ToolSettings {
    build_tool_settings_with_overrides(file_vars, env_lookup, ToolOverrides::default())
}

fn build_tool_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ToolOverrides,
) -> ToolSettings {
    let defaults = ToolSettings::default();
    let path_value = |override_value: Option<PathBuf>, key: &str, default: PathBuf| {
        override_value
            .or_else(|| lookup_value(key, file_vars, &env_lookup).map(PathBuf::from))
            .unwrap_or(default)
    };

    let yt_dlp = path_value(overrides.yt_dlp, "YT_DLP_BIN", defaults.yt_dlp);
    let ffmpeg = path_value(overrides.ffmpeg, "FFMPEG_BIN", defaults.ffmpeg);
    let zip = path_value(overrides.zip, "ZIP_BIN", defaults.zip);
    let log_dir = overrides
        .log_dir
        .or_else(|| lookup_value("AUDIO_LOG_DIR", file_vars, &env_lookup).map(PathBuf::from));
    let concurrent_fragments = lookup_value("YT_DLP_FRAGMENTS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u8>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(defaults.concurrent_fragments);
    let rate_limit = lookup_value("YT_DLP_RATE_LIMIT", file_vars, &env_lookup)
        .unwrap_or(defaults.rate_limit);
    let video_max_height = lookup_value("VIDEO_MAX_HEIGHT", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(defaults.video_max_height);

    ToolSettings {
        yt_dlp,
        ffmpeg,
        zip,
        log_dir,
        concurrent_fragments,
        rate_limit,
        video_max_height,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
