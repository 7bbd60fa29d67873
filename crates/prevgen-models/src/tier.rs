//! Quality tiers and the resolution ladder policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Height used when a work item does not declare one.
pub const UNKNOWN_HEIGHT: u32 = 3;
/// Width used when a work item does not declare one.
pub const UNKNOWN_WIDTH: u32 = 4;

/// Target output quality level, named after its line count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "1080")]
    P1080,
}

impl QualityTier {
    /// All tiers in ascending order.
    pub const LADDER: [QualityTier; 3] = [QualityTier::P480, QualityTier::P720, QualityTier::P1080];

    /// Target height in lines.
    pub fn height(&self) -> u32 {
        match self {
            QualityTier::P480 => 480,
            QualityTier::P720 => 720,
            QualityTier::P1080 => 1080,
        }
    }

    /// Label sent to the shard as the `quality` form field.
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::P480 => "480",
            QualityTier::P720 => "720",
            QualityTier::P1080 => "1080",
        }
    }

    /// Video bitrate for the two-pass encode.
    pub fn video_bitrate(&self) -> &'static str {
        match self {
            QualityTier::P480 => "3M",
            QualityTier::P720 => "5M",
            QualityTier::P1080 => "8M",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown quality tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for QualityTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches('p') {
            "480" => Ok(QualityTier::P480),
            "720" => Ok(QualityTier::P720),
            "1080" => Ok(QualityTier::P1080),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}

/// Maps a source resolution to the ordered set of tiers to produce.
///
/// Tiers are cumulative: a tier is produced only if every lower tier is
/// producible too, so the result is always a prefix of [`QualityTier::LADDER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionLadder;

impl ResolutionLadder {
    /// Tiers for a source whose orientation-agnostic resolution is `height`.
    pub fn tiers(height: u32) -> Vec<QualityTier> {
        QualityTier::LADDER
            .iter()
            .copied()
            .take_while(|tier| height >= tier.height())
            .collect()
    }

    /// Resolution signal for a source: the smaller of its two dimensions.
    ///
    /// Missing dimensions fall back to values below every tier.
    pub fn ladder_input(width: Option<u32>, height: Option<u32>) -> u32 {
        height
            .unwrap_or(UNKNOWN_HEIGHT)
            .min(width.unwrap_or(UNKNOWN_WIDTH))
    }
}
