//! Thumbnail naming and video frame extraction.

use std::path::Path;

use prevgen_models::{MediaKind, QualityTier};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Appended to the source path to name its thumbnail.
pub const THUMBNAIL_SUFFIX: &str = "__thumbnail__.jpg";

/// Appended to the source path to name the frame extracted from a video.
pub const FRAME_SUFFIX: &str = "__thumbnail__preproc.jpg";

/// Suffix naming the scaled derivative of `kind` at `tier`, e.g. `_720p.mp4`.
pub fn scaled_suffix(kind: MediaKind, tier: QualityTier) -> String {
    format!("_{}p.{}", tier.label(), kind.derivative_extension())
}

/// Extract the first frame of a video into a JPEG file.
pub async fn extract_first_frame(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path, output_path)
        .single_frame()
        .output_arg("-q:v")
        .output_arg("2")
        .log_level("error");

    runner.run(&cmd).await
}
