//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the coordinator or a shard.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Coordinator unavailable: {0}")]
    CoordinatorUnavailable(String),

    #[error("Upload to {endpoint} failed with status {status}: {body}")]
    UploadFailed {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Download of {url} failed: {message}")]
    DownloadFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid work item: {0}")]
    InvalidWorkItem(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::CoordinatorUnavailable(msg.into())
    }

    pub fn invalid_work_item(msg: impl Into<String>) -> Self {
        Self::InvalidWorkItem(msg.into())
    }

    pub fn download_failed(
        url: impl Into<String>,
        status: Option<u16>,
        msg: impl Into<String>,
    ) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            status,
            message: msg.into(),
        }
    }

    /// HTTP status associated with this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::UploadFailed { status, .. } => Some(*status),
            ClientError::DownloadFailed { status, .. } => *status,
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True if the request ran into a client-side timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Network(e) if e.is_timeout())
    }
}
