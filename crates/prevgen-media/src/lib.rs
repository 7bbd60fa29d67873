//! Derivative generation for the preview worker.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeout support
//! - Frame extraction and two-pass constant-bitrate transcoding
//! - Image thumbnails, bounded resizes and blurhash preview strings
//! - The [`DerivativeGenerator`] capability trait used by the job pipeline

pub mod command;
pub mod error;
pub mod generator;
pub mod image_ops;
pub mod progress;
pub mod scratch;
pub mod thumbnail;
pub mod transcode;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use generator::{DerivativeGenerator, GeneratorConfig, MediaToolGenerator};
pub use image_ops::{fit_within, render_jpeg, ImageProfile, DEFAULT_JPEG_QUALITY};
pub use progress::FfmpegProgress;
pub use scratch::ScratchFiles;
pub use thumbnail::{extract_first_frame, scaled_suffix, FRAME_SUFFIX, THUMBNAIL_SUFFIX};
pub use transcode::TwoPassPlan;
