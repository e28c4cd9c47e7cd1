use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RadarError>;

#[derive(Debug, Error)]
pub enum RadarError {
    #[error("repository backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("cannot resolve ref {reference:?} (HEAD fallback failed as well)")]
    RefResolution { reference: String },

    #[error("I/O failure while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("git command failed: `{program}` {args:?}, exit_code={exit_code:?}, stderr={stderr}")]
    GitCommandFailed {
        program: String,
        args: Vec<String>,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("invalid git repository: {0}")]
    InvalidRepository(PathBuf),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown commit: {0}")]
    UnknownCommit(String),

    #[error("config error: {0}")]
    Config(String),
}

impl RadarError {
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// True when the failure means the repository cannot be queried at all,
    /// as opposed to one query failing.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::InvalidRepository(_))
    }
}
