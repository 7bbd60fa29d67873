//! The derivative generation capability and its FFmpeg/`image` implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use prevgen_models::{LocalFilePointer, MediaKind, QualityTier};

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::image_ops::{render_jpeg, ImageProfile, DEFAULT_JPEG_QUALITY};
use crate::scratch::ScratchFiles;
use crate::thumbnail::{extract_first_frame, FRAME_SUFFIX};
use crate::transcode::TwoPassPlan;

/// Produces thumbnails and scaled variants of a local source file.
///
/// The caller chooses (and owns) every output path; implementations only
/// write to it. Intermediate files an implementation creates on its own must
/// be gone by the time a call returns or its future is dropped.
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    /// Write a bounded JPEG thumbnail of `input` to `output`.
    ///
    /// The returned pointer carries the source dimensions and a preview hash.
    async fn thumbnail(
        &self,
        input: &LocalFilePointer,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer>;

    /// Write the `tier` variant of `input` to `output`.
    async fn scale(
        &self,
        input: &LocalFilePointer,
        tier: QualityTier,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer>;
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Hard limit for each FFmpeg invocation
    pub tool_timeout: Duration,
    pub thumbnail_max_dimension: u32,
    pub jpeg_quality: u8,
    /// FFmpeg binary; looked up on `PATH` when unset
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(3600),
            thumbnail_max_dimension: 900,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            ffmpeg_path: None,
        }
    }
}

/// Production generator: FFmpeg for video, the `image` crate for stills.
#[derive(Debug, Clone)]
pub struct MediaToolGenerator {
    config: GeneratorConfig,
    runner: FfmpegRunner,
}

impl MediaToolGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let mut runner = FfmpegRunner::new().with_timeout(config.tool_timeout);
        if let Some(binary) = &config.ffmpeg_path {
            runner = runner.with_binary(binary);
        }
        Self { config, runner }
    }

    async fn thumbnail_image(
        &self,
        src: &Path,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer> {
        let profile =
            ImageProfile::thumbnail(self.config.thumbnail_max_dimension, self.config.jpeg_quality);
        let metadata = render_jpeg(src.to_path_buf(), output.path().to_path_buf(), profile).await?;
        Ok(output.with_metadata(metadata))
    }
}

impl Default for MediaToolGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

#[async_trait]
impl DerivativeGenerator for MediaToolGenerator {
    async fn thumbnail(
        &self,
        input: &LocalFilePointer,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer> {
        match input.item().kind() {
            MediaKind::Image => self.thumbnail_image(input.path(), output).await,
            MediaKind::Video => {
                let frame = input.sibling_path(FRAME_SUFFIX);
                let scratch = ScratchFiles::new([frame.clone()]);
                let result = match extract_first_frame(&self.runner, input.path(), &frame).await {
                    Ok(()) => self.thumbnail_image(&frame, output).await,
                    Err(e) => Err(e),
                };
                drop(scratch);

                debug!(
                    source = %input.path().display(),
                    ok = result.is_ok(),
                    "Video thumbnail done"
                );
                result
            }
            other => Err(MediaError::UnsupportedMediaKind(other)),
        }
    }

    async fn scale(
        &self,
        input: &LocalFilePointer,
        tier: QualityTier,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer> {
        match input.item().kind() {
            MediaKind::Image => {
                let profile = ImageProfile::scaled(tier, self.config.jpeg_quality);
                let metadata =
                    render_jpeg(input.path().to_path_buf(), output.path().to_path_buf(), profile)
                        .await?;
                Ok(output.with_metadata(metadata))
            }
            MediaKind::Video => {
                TwoPassPlan::new(input.path(), output.path(), tier)
                    .run(&self.runner)
                    .await?;
                Ok(output)
            }
            other => Err(MediaError::UnsupportedMediaKind(other)),
        }
    }
}
