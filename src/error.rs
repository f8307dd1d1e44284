//! Fatal failure taxonomy for a single extraction run.
//!
//! Helpers and adapters return `anyhow::Result`; the pipeline folds those into
//! one of these variants at the stage boundary so the binary can decide how to
//! report the failure and which exit code to use.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Usage(String),
    #[error("invalid YouTube URL: {0}")]
    InvalidInput(String),
    #[error("{tool} is not available ({reason}); install it with `{hint}`")]
    DependencyMissing {
        tool: String,
        reason: String,
        hint: String,
    },
    #[error("filesystem error: {0}")]
    Filesystem(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
}

impl RunError {
    /// Every fatal outcome exits with status 1; usage output that the user
    /// asked for (`--help`) never reaches this type.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Short label used as the log prefix for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Usage(_) => "usage",
            RunError::InvalidInput(_) => "invalid input",
            RunError::DependencyMissing { .. } => "missing dependency",
            RunError::Filesystem(_) => "filesystem",
            RunError::Extraction(_) => "extraction",
        }
    }

    pub(crate) fn filesystem(err: &anyhow::Error) -> Self {
        RunError::Filesystem(format!("{err:#}"))
    }

    pub(crate) fn extraction(err: &anyhow::Error) -> Self {
        RunError::Extraction(format!("{err:#}"))
    }
}
