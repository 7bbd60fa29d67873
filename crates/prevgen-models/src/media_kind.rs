//! Declared media kind of a stored file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media kind as declared by the coordinator.
///
/// Unknown values (and `null`) decode to [`MediaKind::Other`] so that a new
/// kind on the coordinator side never breaks work-list decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Plaintext,
    Binary,
    #[default]
    #[serde(other)]
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "IMAGE",
            MediaKind::Video => "VIDEO",
            MediaKind::Audio => "AUDIO",
            MediaKind::Document => "DOCUMENT",
            MediaKind::Plaintext => "PLAINTEXT",
            MediaKind::Binary => "BINARY",
            MediaKind::Other => "OTHER",
        }
    }

    /// Whether derivatives (thumbnail and scaled tiers) can be produced.
    pub fn is_processable(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }

    /// File extension used for scaled derivatives of this kind.
    pub fn derivative_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            _ => "jpeg",
        }
    }

    /// Content type used when uploading a scaled derivative of this kind.
    pub fn derivative_content_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            _ => "image/jpeg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
