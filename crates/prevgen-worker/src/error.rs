//! Worker error types.

use thiserror::Error;

use prevgen_client::ClientError;
use prevgen_media::MediaError;
use prevgen_models::{JobOutcome, MediaKind};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Fetching work failed: {0}")]
    Fetch(#[source] ClientError),

    #[error("Download failed: {0}")]
    Download(#[source] ClientError),

    #[error("Unsupported media kind: {0}")]
    UnsupportedMediaKind(MediaKind),

    #[error("Upload failed: {0}")]
    Upload(#[source] ClientError),

    #[error("Derivative generation failed: {0}")]
    Generate(#[source] MediaError),

    #[error("{step} timed out after {secs} seconds")]
    Timeout { step: &'static str, secs: u64 },

    #[error("Invalid work item: {0}")]
    InvalidWorkItem(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error category, used for outcomes and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Fetch,
    Download,
    UnsupportedMediaKind,
    Upload,
    Generate,
    Timeout,
    InvalidWorkItem,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::Download => "download",
            ErrorKind::UnsupportedMediaKind => "unsupported_media_kind",
            ErrorKind::Upload => "upload",
            ErrorKind::Generate => "generate",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidWorkItem => "invalid_work_item",
            ErrorKind::Config => "config",
        }
    }
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_work_item(msg: impl Into<String>) -> Self {
        Self::InvalidWorkItem(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Fetch(_) => ErrorKind::Fetch,
            WorkerError::Download(_) => ErrorKind::Download,
            WorkerError::UnsupportedMediaKind(_) => ErrorKind::UnsupportedMediaKind,
            WorkerError::Upload(_) => ErrorKind::Upload,
            WorkerError::Generate(_) => ErrorKind::Generate,
            WorkerError::Timeout { .. } => ErrorKind::Timeout,
            WorkerError::InvalidWorkItem(_) => ErrorKind::InvalidWorkItem,
            WorkerError::Config(_) => ErrorKind::Config,
        }
    }

    /// Terminal job outcome for a job that stopped on this error.
    pub fn outcome(&self) -> JobOutcome {
        match self {
            WorkerError::UnsupportedMediaKind(_) => JobOutcome::InvalidFile,
            _ => JobOutcome::Failed,
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::UnsupportedMediaKind(kind) => WorkerError::UnsupportedMediaKind(kind),
            MediaError::Timeout(secs) => WorkerError::Timeout {
                step: "ffmpeg",
                secs,
            },
            other => WorkerError::Generate(other),
        }
    }
}
