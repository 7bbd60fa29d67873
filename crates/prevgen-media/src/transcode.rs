//! Two-pass constant-bitrate transcoding for scaled video tiers.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use prevgen_models::QualityTier;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::scratch::ScratchFiles;

const VIDEO_CODEC: &str = "libx264";
const PRESET: &str = "medium";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "256k";

/// Files and arguments for one two-pass encode.
///
/// The pass-log prefix carries a fresh UUID so concurrent encodes of the same
/// source never share statistics files.
#[derive(Debug, Clone)]
pub struct TwoPassPlan {
    input: PathBuf,
    output: PathBuf,
    tier: QualityTier,
    log_prefix: PathBuf,
    pass1_output: PathBuf,
}

impl TwoPassPlan {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, tier: QualityTier) -> Self {
        let input = input.into();
        let output = output.into();
        let log_prefix = append(&input, &format!("_{}", Uuid::new_v4()));
        let pass1_output = append(&output, ".pass1.tmp.mp4");

        Self {
            input,
            output,
            tier,
            log_prefix,
            pass1_output,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn log_prefix(&self) -> &Path {
        &self.log_prefix
    }

    fn base(&self, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(&self.input, output)
            .gen_pts()
            .video_filter(format!("scale=-2:{}", self.tier.height()))
            .video_codec(VIDEO_CODEC)
            .preset(PRESET)
    }

    /// Analysis pass: video only, statistics written under the log prefix.
    pub fn pass_one(&self) -> FfmpegCommand {
        self.base(&self.pass1_output)
            .video_bitrate(self.tier.video_bitrate())
            .pass(1, &self.log_prefix)
            .no_audio()
            .format("mp4")
    }

    /// Final pass: web-friendly pixel format, AAC audio, moov atom up front.
    pub fn pass_two(&self) -> FfmpegCommand {
        self.base(&self.output)
            .pixel_format("yuv420p")
            .video_bitrate(self.tier.video_bitrate())
            .pass(2, &self.log_prefix)
            .audio_codec(AUDIO_CODEC)
            .audio_bitrate(AUDIO_BITRATE)
            .movflags("+faststart")
    }

    /// Intermediate files left behind by the two passes.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        vec![
            self.pass1_output.clone(),
            append(&self.log_prefix, "-0.log"),
            append(&self.log_prefix, "-0.log.mbtree"),
        ]
    }

    /// Run both passes, then remove intermediates whatever the result.
    ///
    /// Intermediates are also removed if this future is dropped mid-encode.
    pub async fn run(&self, runner: &FfmpegRunner) -> MediaResult<()> {
        let scratch = ScratchFiles::new(self.artifacts());
        let result = self.run_passes(runner).await;
        drop(scratch);

        match &result {
            Ok(()) => info!(
                tier = %self.tier,
                output = %self.output.display(),
                "Transcoded video tier"
            ),
            Err(e) => warn!(tier = %self.tier, error = %e, "Transcode failed"),
        }
        result
    }

    async fn run_passes(&self, runner: &FfmpegRunner) -> MediaResult<()> {
        debug!(tier = %self.tier, "Starting pass 1");
        runner.run(&self.pass_one()).await?;
        debug!(tier = %self.tier, "Starting pass 2");
        runner.run(&self.pass_two()).await
    }
}

fn append(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
