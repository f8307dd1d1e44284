//! Run-scoped log sink.
//!
//! A `RunLog` is created once when the binary starts and handed by reference
//! to every stage. Each record is appended to a plain-text log file with a
//! timestamp and, unless it is a file-only note, echoed to the console with a
//! coloured severity prefix.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use console::style;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// `strftime` pattern for the per-run log file name.
pub const LOG_FILE_PATTERN: &str = "audio_extract_%Y%m%d_%H%M%S.log";
const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        }
    }

    /// Line written to the log file, e.g. `[2025-01-15 10:04:05] [INFO] ...`.
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format(RECORD_TIMESTAMP_FORMAT),
            self.severity.label(),
            self.message
        )
    }
}

pub fn log_file_name(started: DateTime<Local>) -> String {
    started.format(LOG_FILE_PATTERN).to_string()
}

/// Directory holding the running executable; the log lands next to it unless
/// `AUDIO_LOG_DIR` says otherwise.
pub fn default_log_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug)]
pub struct RunLog {
    file: Option<File>,
    path: Option<PathBuf>,
    console: bool,
}

impl RunLog {
    /// Opens `<dir>/audio_extract_<stamp>.log` for appending.
    pub fn create(dir: &Path, started: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Self::open(&dir.join(log_file_name(started)))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            file: Some(file),
            path: Some(path.to_path_buf()),
            console: true,
        })
    }

    /// Used when the log file cannot be opened: the run continues with
    /// console output only.
    pub fn console_only() -> Self {
        Self {
            file: None,
            path: None,
            console: true,
        }
    }

    /// Disables console echo; records still reach the file.
    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(Severity::Info, message.as_ref(), true);
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.record(Severity::Success, message.as_ref(), true);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.record(Severity::Warning, message.as_ref(), true);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(Severity::Error, message.as_ref(), true);
    }

    /// File-only record for details that would clutter the terminal.
    pub fn note(&self, message: impl AsRef<str>) {
        self.record(Severity::Info, message.as_ref(), false);
    }

    /// Echoes one progress line from an external tool verbatim and keeps a
    /// copy in the log file.
    pub fn progress(&self, line: &str) {
        if self.console {
            println!("  {line}");
        }
        self.append(&LogRecord::new(Severity::Info, line));
    }

    pub fn banner(&self, title: &str) {
        if self.console {
            println!("===================================");
            println!("{}", style(title).bold());
            println!("===================================");
        }
        self.append(&LogRecord::new(Severity::Info, format!("=== {title} ===")));
    }

    fn record(&self, severity: Severity, message: &str, echo: bool) {
        let record = LogRecord::new(severity, message);
        if echo && self.console {
            print_console(&record);
        }
        self.append(&record);
    }

    fn append(&self, record: &LogRecord) {
        let Some(file) = &self.file else {
            return;
        };
        let mut handle: &File = file;
        if let Err(err) = writeln!(handle, "{}", record.to_line()) {
            tracing::warn!(error = %err, "could not append to run log");
        }
    }
}

fn print_console(record: &LogRecord) {
    let label = format!("[{}]", record.severity.label());
    match record.severity {
        Severity::Info => println!("{} {}", style(label).blue().bold(), record.message),
        Severity::Success => println!("{} {}", style(label).green().bold(), record.message),
        Severity::Warning => eprintln!("{} {}", style(label).yellow().bold(), record.message),
        Severity::Error => eprintln!("{} {}", style(label).red().bold(), record.message),
    }
}
