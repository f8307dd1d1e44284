//! One extraction run, start to finish.
//!
//! Stages run strictly in order. Anything up to and including locating the
//! extracted audio is fatal and surfaces as a [`RunError`]; everything after
//! that (thumbnail, video, report, archive) is best-effort and only leaves a
//! [`StageWarning`] behind.

use chrono::Local;
use std::fmt;
use std::path::PathBuf;

use crate::archive::Archiver;
use crate::error::RunError;
use crate::extract::{
    AudioRequest, MediaExtractor, Resolution, THUMBNAIL_DOWNLOAD_STEM, finalize_thumbnail,
    locate_video, output_template, resolve_output,
};
use crate::layout::{REPORT_FILE, THUMBNAIL_EXT, build_output_folder, thumbnail_path};
use crate::logging::RunLog;
use crate::metadata::{MetadataSource, VideoMetadata, fetch_metadata};
use crate::options::RunConfig;
use crate::report::{ReportContext, write_report};
use crate::sanitize::{sanitize_filename, sanitize_with_timestamp};
use crate::validate::{KNOWN_URL_SHAPES, is_supported_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Thumbnail,
    Video,
    Report,
    Archive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Metadata => "metadata",
            Stage::Thumbnail => "thumbnail",
            Stage::Video => "video",
            Stage::Report => "report",
            Stage::Archive => "archive",
        };
        f.write_str(name)
    }
}

/// A recovered failure in an optional stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputArtifacts {
    pub folder: PathBuf,
    pub audio: PathBuf,
    pub thumbnail: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub archive: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metadata: VideoMetadata,
    pub artifacts: OutputArtifacts,
    pub warnings: Vec<StageWarning>,
}

/// Collaborators for a run. The binary wires in yt-dlp and zip; tests hand in
/// fakes.
pub struct Pipeline<'a> {
    pub metadata: &'a dyn MetadataSource,
    pub extractor: &'a dyn MediaExtractor,
    pub archiver: &'a dyn Archiver,
    pub log: &'a RunLog,
}

impl Pipeline<'_> {
    pub fn run(&self, config: &RunConfig) -> Result<RunOutcome, RunError> {
        let log = self.log;
        config.validate()?;

        if !is_supported_url(&config.url) {
            log.note(format!("accepted URL shapes: {}", KNOWN_URL_SHAPES.join(", ")));
            return Err(RunError::InvalidInput(config.url.clone()));
        }

        log.info("Checking dependencies...");
        self.extractor.check_available()?;
        log.success("All dependencies found");

        let fetched = fetch_metadata(self.metadata, &config.url, log);
        let metadata = fetched.metadata;
        let mut warnings: Vec<StageWarning> = fetched
            .warnings
            .into_iter()
            .map(|message| StageWarning {
                stage: Stage::Metadata,
                message,
            })
            .collect();

        let safe_title = sanitize_filename(&metadata.title);
        let folder = build_output_folder(&config.output_dir, &safe_title)
            .map_err(|err| RunError::filesystem(&err))?;
        log.success(format!("Output folder: {}", folder.display()));

        let file_stem = sanitize_with_timestamp(&metadata.title);
        let request = AudioRequest {
            url: &config.url,
            folder: &folder,
            file_stem: &file_stem,
            format: config.format,
            quality: config.quality,
            embed_metadata: config.embed_metadata,
        };
        log.info(format!(
            "Extracting audio ({}, {} kbps)...",
            config.format, config.quality
        ));
        self.extractor
            .extract_audio(&request, log)
            .map_err(|err| RunError::extraction(&err))?;

        let audio = match resolve_output(&folder, &file_stem, config.format.extension()) {
            Resolution::Exact(path) => path,
            Resolution::Fallback(path) => {
                log.warn(format!(
                    "Audio was not at {}, using {}",
                    request.expected_path().display(),
                    path.display()
                ));
                path
            }
            Resolution::NotFound => {
                return Err(RunError::Extraction(format!(
                    "the extractor reported success but no .{} file was found in {}",
                    config.format.extension(),
                    folder.display()
                )));
            }
        };
        log.success(format!("Audio saved: {}", audio.display()));

        let mut artifacts = OutputArtifacts {
            folder: folder.clone(),
            audio,
            ..OutputArtifacts::default()
        };
        let mut warn = |stage: Stage, message: String| {
            log.warn(&message);
            warnings.push(StageWarning { stage, message });
        };

        log.info("Downloading thumbnail...");
        let thumbnail_target = thumbnail_path(&folder, &safe_title);
        let thumbnail = self
            .extractor
            .fetch_thumbnail(
                &config.url,
                &output_template(&folder, THUMBNAIL_DOWNLOAD_STEM),
                log,
            )
            .and_then(|()| finalize_thumbnail(&folder, &thumbnail_target));
        match thumbnail {
            Ok(path) => {
                log.success(format!("Thumbnail saved: {}", path.display()));
                artifacts.thumbnail = Some(path);
            }
            Err(err) => warn(Stage::Thumbnail, format!("Thumbnail skipped: {err:#}")),
        }

        if config.keep_video {
            log.info("Downloading original video...");
            let claimed = [config.format.extension(), THUMBNAIL_EXT, "md"];
            match self
                .extractor
                .fetch_video(&config.url, &output_template(&folder, &file_stem), log)
            {
                Ok(()) => match locate_video(&folder, &file_stem, &claimed) {
                    Some(path) => {
                        log.success(format!("Video saved: {}", path.display()));
                        artifacts.video = Some(path);
                    }
                    None => warn(
                        Stage::Video,
                        format!("Video download finished but no {file_stem}.* video file was found"),
                    ),
                },
                Err(err) => warn(Stage::Video, format!("Video download failed: {err:#}")),
            }
        }

        log.info(format!("Writing {REPORT_FILE}..."));
        let report = write_report(&ReportContext {
            config,
            metadata: &metadata,
            folder: &folder,
            audio: &artifacts.audio,
            video: artifacts.video.as_deref(),
            processed_at: Local::now(),
        });
        match report {
            Ok(path) => {
                log.success(format!("Report saved: {}", path.display()));
                artifacts.report = Some(path);
            }
            Err(err) => warn(Stage::Report, format!("Report not written: {err:#}")),
        }

        if config.compress {
            log.info("Creating zip archive...");
            match self.archiver.archive(&folder) {
                Ok(path) => {
                    log.success(format!("Archive saved: {}", path.display()));
                    artifacts.archive = Some(path);
                }
                Err(err) => warn(Stage::Archive, format!("Archive not created: {err:#}")),
            }
        }

        Ok(RunOutcome {
            metadata,
            artifacts,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::{StaticSource, sample_details};
    use crate::options::AudioFormat;
    use anyhow::{Result, bail};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[derive(Clone, Copy)]
    enum AudioOutcome {
        Expected,
        Divergent,
        NoFile,
        Fails,
    }

    struct FakeExtractor {
        available: bool,
        audio: AudioOutcome,
        thumbnail_ok: bool,
        calls: RefCell<Vec<&'static str>>,
    }

    impl FakeExtractor {
        fn new() -> Self {
            Self {
                available: true,
                audio: AudioOutcome::Expected,
                thumbnail_ok: true,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }
    }

    fn fill_template(template: &Path, ext: &str) -> String {
        template.to_string_lossy().replace("%(ext)s", ext)
    }

    impl MediaExtractor for FakeExtractor {
        fn check_available(&self) -> Result<(), RunError> {
            self.calls.borrow_mut().push("check");
            if self.available {
                Ok(())
            } else {
                Err(RunError::DependencyMissing {
                    tool: "yt-dlp".into(),
                    reason: "not installed or not in PATH".into(),
                    hint: "pip install -U yt-dlp".into(),
                })
            }
        }

        fn extract_audio(&self, request: &AudioRequest<'_>, log: &RunLog) -> Result<()> {
            self.calls.borrow_mut().push("audio");
            log.progress("[download] 100.0%");
            match self.audio {
                AudioOutcome::Expected => fs::write(request.expected_path(), "audio")?,
                AudioOutcome::Divergent => fs::write(
                    request
                        .folder
                        .join(format!("Diverging Name.{}", request.format.extension())),
                    "audio",
                )?,
                AudioOutcome::NoFile => {}
                AudioOutcome::Fails => bail!("yt-dlp exited with status 1"),
            }
            Ok(())
        }

        fn fetch_thumbnail(&self, _url: &str, template: &Path, _log: &RunLog) -> Result<()> {
            self.calls.borrow_mut().push("thumbnail");
            if !self.thumbnail_ok {
                bail!("thumbnail download exited with status 1");
            }
            fs::write(fill_template(template, "png"), "png")?;
            Ok(())
        }

        fn fetch_video(&self, _url: &str, template: &Path, _log: &RunLog) -> Result<()> {
            self.calls.borrow_mut().push("video");
            fs::write(fill_template(template, "webm"), "video")?;
            Ok(())
        }
    }

    struct FakeArchiver {
        fails: bool,
    }

    impl Archiver for FakeArchiver {
        fn archive(&self, folder: &Path) -> Result<PathBuf> {
            if self.fails {
                bail!("zip exited with status 12");
            }
            let target = crate::layout::archive_path(folder);
            fs::write(&target, "zip")?;
            Ok(target)
        }
    }

    fn source() -> StaticSource {
        StaticSource {
            title: Some("Never Gonna Give You Up".into()),
            template_title: None,
            details: Some(sample_details()),
        }
    }

    struct Harness {
        out: TempDir,
        log_dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                out: tempdir().unwrap(),
                log_dir: tempdir().unwrap(),
            }
        }

        fn config(&self) -> RunConfig {
            let mut config = RunConfig::new(URL);
            config.output_dir = self.out.path().to_path_buf();
            config
        }

        fn log_path(&self) -> PathBuf {
            self.log_dir.path().join("run.log")
        }

        fn run(
            &self,
            config: &RunConfig,
            source: &StaticSource,
            extractor: &FakeExtractor,
            archiver: &FakeArchiver,
        ) -> Result<RunOutcome, RunError> {
            let log = RunLog::open(&self.log_path()).unwrap().quiet();
            Pipeline {
                metadata: source,
                extractor,
                archiver,
                log: &log,
            }
            .run(config)
        }

        fn log_text(&self) -> String {
            fs::read_to_string(self.log_path()).unwrap_or_default()
        }
    }

    #[test]
    fn default_run_produces_audio_thumbnail_and_report() {
        let harness = Harness::new();
        let extractor = FakeExtractor::new();
        let outcome = harness
            .run(
                &harness.config(),
                &source(),
                &extractor,
                &FakeArchiver { fails: false },
            )
            .unwrap();

        let artifacts = &outcome.artifacts;
        let folder = fs::canonicalize(harness.out.path())
            .unwrap()
            .join("audio__never_gonna_give_you_up");
        assert_eq!(artifacts.folder, folder);

        let audio_name = artifacts.audio.file_name().unwrap().to_string_lossy();
        assert!(audio_name.starts_with("never_gonna_give_you_up_"));
        assert!(audio_name.ends_with(".mp3"));
        assert_eq!(
            artifacts.thumbnail.as_deref(),
            Some(folder.join("never_gonna_give_you_up_thumbnail.png").as_path())
        );
        assert_eq!(artifacts.report.as_deref(), Some(folder.join("metadata.md").as_path()));
        assert!(artifacts.video.is_none());
        assert!(artifacts.archive.is_none());
        assert!(outcome.warnings.is_empty());
        assert_eq!(extractor.calls(), ["check", "audio", "thumbnail"]);

        let report = fs::read_to_string(folder.join("metadata.md")).unwrap();
        assert!(report.contains("# Never Gonna Give You Up"));
        assert!(report.contains(&format!("- {audio_name}")));
        assert!(harness.log_text().contains("[SUCCESS] Audio saved"));
    }

    #[test]
    fn keep_video_and_compress() {
        let harness = Harness::new();
        let mut config = harness.config();
        config.format = AudioFormat::Flac;
        config.keep_video = true;
        config.compress = true;
        let extractor = FakeExtractor::new();

        let outcome = harness
            .run(&config, &source(), &extractor, &FakeArchiver { fails: false })
            .unwrap();
        let artifacts = &outcome.artifacts;

        let video = artifacts.video.as_ref().unwrap();
        assert_eq!(video.extension().unwrap(), "webm");
        assert_eq!(video.file_stem(), artifacts.audio.file_stem());
        assert_eq!(artifacts.audio.extension().unwrap(), "flac");
        let archive = artifacts.archive.as_ref().unwrap();
        assert_eq!(archive.file_name().unwrap(), "audio__never_gonna_give_you_up.zip");
        assert_eq!(archive.parent(), artifacts.folder.parent());
        assert_eq!(extractor.calls(), ["check", "audio", "thumbnail", "video"]);

        let report = fs::read_to_string(artifacts.report.as_ref().unwrap()).unwrap();
        assert!(!report.contains("Not downloaded"));
        assert!(report.contains("- **Format:** FLAC"));
    }

    #[test]
    fn optional_stage_failures_are_warnings() {
        let harness = Harness::new();
        let mut config = harness.config();
        config.compress = true;
        let mut extractor = FakeExtractor::new();
        extractor.thumbnail_ok = false;

        let outcome = harness
            .run(&config, &source(), &extractor, &FakeArchiver { fails: true })
            .unwrap();

        let stages: Vec<Stage> = outcome.warnings.iter().map(|w| w.stage).collect();
        assert_eq!(stages, [Stage::Thumbnail, Stage::Archive]);
        assert!(outcome.artifacts.thumbnail.is_none());
        assert!(outcome.artifacts.archive.is_none());
        assert!(outcome.artifacts.report.is_some());
        assert!(outcome.artifacts.audio.is_file());
        assert!(harness.log_text().contains("[WARNING] Archive not created"));
    }

    #[test]
    fn divergent_audio_name_is_found_by_extension() {
        let harness = Harness::new();
        let mut extractor = FakeExtractor::new();
        extractor.audio = AudioOutcome::Divergent;

        let outcome = harness
            .run(
                &harness.config(),
                &source(),
                &extractor,
                &FakeArchiver { fails: false },
            )
            .unwrap();
        assert_eq!(
            outcome.artifacts.audio.file_name().unwrap(),
            "Diverging Name.mp3"
        );
    }

    #[test]
    fn missing_audio_after_success_is_an_extraction_error() {
        let harness = Harness::new();
        let mut extractor = FakeExtractor::new();
        extractor.audio = AudioOutcome::NoFile;

        let err = harness
            .run(
                &harness.config(),
                &source(),
                &extractor,
                &FakeArchiver { fails: false },
            )
            .unwrap_err();
        assert!(matches!(err, RunError::Extraction(_)));
        assert_eq!(extractor.calls(), ["check", "audio"]);
    }

    #[test]
    fn failed_extraction_stops_the_run() {
        let harness = Harness::new();
        let mut extractor = FakeExtractor::new();
        extractor.audio = AudioOutcome::Fails;

        let err = harness
            .run(
                &harness.config(),
                &source(),
                &extractor,
                &FakeArchiver { fails: false },
            )
            .unwrap_err();
        assert!(matches!(err, RunError::Extraction(ref msg) if msg.contains("status 1")));
        let folder = harness.out.path().join("audio__never_gonna_give_you_up");
        assert!(!folder.join("metadata.md").exists());
    }

    #[test]
    fn fallback_title_is_recorded_as_a_warning() {
        let harness = Harness::new();
        let extractor = FakeExtractor::new();
        let outcome = harness
            .run(
                &harness.config(),
                &StaticSource::default(),
                &extractor,
                &FakeArchiver { fails: false },
            )
            .unwrap();

        assert!(outcome.metadata.title_is_fallback);
        assert!(outcome.metadata.title.starts_with("audio_"));
        let stages: Vec<Stage> = outcome.warnings.iter().map(|w| w.stage).collect();
        assert_eq!(stages, [Stage::Metadata, Stage::Metadata]);
        assert!(outcome.artifacts.audio.is_file());
    }

    #[test]
    fn unsupported_url_is_rejected_before_any_tool_runs() {
        let harness = Harness::new();
        let mut config = harness.config();
        config.url = "https://vimeo.com/12345".into();
        let extractor = FakeExtractor::new();

        let err = harness
            .run(&config, &source(), &extractor, &FakeArchiver { fails: false })
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidInput(_)));
        assert!(extractor.calls().is_empty());
        assert_eq!(fs::read_dir(harness.out.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_dependency_stops_before_metadata() {
        let harness = Harness::new();
        let mut extractor = FakeExtractor::new();
        extractor.available = false;

        let err = harness
            .run(
                &harness.config(),
                &source(),
                &extractor,
                &FakeArchiver { fails: false },
            )
            .unwrap_err();
        assert!(matches!(err, RunError::DependencyMissing { .. }));
        assert_eq!(extractor.calls(), ["check"]);
        assert_eq!(fs::read_dir(harness.out.path()).unwrap().count(), 0);
    }

    #[test]
    fn out_of_range_quality_is_a_usage_error() {
        let harness = Harness::new();
        let mut config = harness.config();
        config.quality = 999;
        let extractor = FakeExtractor::new();

        let err = harness
            .run(&config, &source(), &extractor, &FakeArchiver { fails: false })
            .unwrap_err();
        assert!(matches!(err, RunError::Usage(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(extractor.calls().is_empty());
    }
}
