#![forbid(unsafe_code)]

//! `extract_audio`: downloads the audio track of one YouTube video into an
//! `audio__<title>/` folder next to its thumbnail and a markdown report.
//!
//! yt-dlp does the fetching and ffmpeg the transcoding; this binary only
//! parses arguments, wires the tool adapters into the pipeline and turns the
//! outcome into an exit status.

use chrono::Local;
use clap::Parser;
use clap::error::ErrorKind;
use console::style;
use newtube_audio::archive::ZipArchiver;
use newtube_audio::config::load_tool_settings;
use newtube_audio::error::RunError;
use newtube_audio::logging::{RunLog, default_log_dir};
use newtube_audio::options::{AudioFormat, DEFAULT_QUALITY, MAX_QUALITY, RunConfig};
use newtube_audio::pipeline::{Pipeline, RunOutcome};
use newtube_audio::ytdlp::YtDlp;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "extract_audio",
    version,
    about = "Extract the audio track of a YouTube video into an organized folder"
)]
struct Cli {
    /// YouTube video, short-link, embed, music or playlist URL
    url: String,

    /// Directory the `audio__<title>` folder is created in
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Audio bitrate in kbps
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_QUALITY,
        value_parser = clap::value_parser!(u16).range(0..=i64::from(MAX_QUALITY))
    )]
    quality: u16,

    /// Output audio format
    #[arg(short, long, value_enum, default_value_t = AudioFormat::Mp3)]
    format: AudioFormat,

    /// Do not embed the thumbnail and tags into the audio file
    #[arg(long)]
    no_metadata: bool,

    /// Also download the original video (capped at 1080p by default)
    #[arg(long)]
    keep_video: bool,

    /// Zip the output folder when done
    #[arg(long)]
    compress: bool,
}

impl Cli {
    fn into_run_config(self) -> RunConfig {
        RunConfig {
            url: self.url,
            output_dir: self.output,
            quality: self.quality,
            format: self.format,
            embed_metadata: !self.no_metadata,
            keep_video: self.keep_video,
            compress: self.compress,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    init_tracing();

    let settings = match load_tool_settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{} {err:#}", style("[ERROR]").red().bold());
            return ExitCode::from(1);
        }
    };
    tracing::debug!(?settings, "resolved tool settings");

    let log_dir = settings.log_dir.clone().unwrap_or_else(default_log_dir);
    let log = match RunLog::create(&log_dir, Local::now()) {
        Ok(log) => log,
        Err(err) => {
            let log = RunLog::console_only();
            log.warn(format!("Logging to console only: {err:#}"));
            log
        }
    };

    let config = cli.into_run_config();
    log.banner("YouTube Audio Extractor");
    log.info(format!("URL: {}", config.url));
    if let Some(path) = log.path() {
        log.info(format!("Log file: {}", path.display()));
    }

    let ytdlp = YtDlp::from_settings(&settings);
    let archiver = ZipArchiver::new(settings.zip.clone());
    let pipeline = Pipeline {
        metadata: &ytdlp,
        extractor: &ytdlp,
        archiver: &archiver,
        log: &log,
    };

    match pipeline.run(&config) {
        Ok(outcome) => {
            print_summary(&log, &outcome);
            ExitCode::SUCCESS
        }
        Err(err) => report_failure(&log, &err),
    }
}

/// `RUST_LOG`-driven diagnostics on stderr; silent unless asked for.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_summary(log: &RunLog, outcome: &RunOutcome) {
    let artifacts = &outcome.artifacts;
    log.banner("Extraction complete");
    log.success(format!("Title:  {}", outcome.metadata.title));
    log.success(format!("Folder: {}", artifacts.folder.display()));
    log.success(format!("Audio:  {}", artifacts.audio.display()));
    if let Some(thumbnail) = &artifacts.thumbnail {
        log.info(format!("Thumbnail: {}", thumbnail.display()));
    }
    if let Some(video) = &artifacts.video {
        log.info(format!("Video: {}", video.display()));
    }
    if let Some(report) = &artifacts.report {
        log.info(format!("Report: {}", report.display()));
    }
    if let Some(archive) = &artifacts.archive {
        log.info(format!("Archive: {}", archive.display()));
    }
    if !outcome.warnings.is_empty() {
        log.warn(format!(
            "Finished with {} warning(s):",
            outcome.warnings.len()
        ));
        for warning in &outcome.warnings {
            log.warn(format!("  [{}] {}", warning.stage, warning.message));
        }
    }
}

fn report_failure(log: &RunLog, err: &RunError) -> ExitCode {
    log.error(format!("{} error: {err}", err.kind()));
    if let Some(path) = log.path() {
        log.info(format!("See {} for details", path.display()));
    }
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}
