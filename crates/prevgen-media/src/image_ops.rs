//! Bounded JPEG resizing and blurhash preview strings.
//!
//! Everything here is synchronous and CPU-bound; callers run it through
//! [`render_jpeg`], which moves the work onto the blocking pool.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use tracing::debug;

use prevgen_models::{ExtractedMetadata, QualityTier};

use crate::error::{MediaError, MediaResult};

/// Default JPEG quality for every derivative.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Bounding box the preview hash is computed from.
const PREVIEW_HASH_BOX: u32 = 32;

/// Blurhash components in each direction.
const PREVIEW_HASH_COMPONENTS: u32 = 4;

/// Target profile for an image derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProfile {
    /// Bounding box edge length (fit inside `max_dimension × max_dimension`)
    pub max_dimension: u32,
    pub quality: u8,
    /// Compute a blurhash preview string from the result
    pub preview_hash: bool,
}

impl ImageProfile {
    /// Thumbnail profile: bounded box plus preview hash.
    pub fn thumbnail(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
            preview_hash: true,
        }
    }

    /// Scaled tier profile: `tier × tier` box, no preview hash.
    pub fn scaled(tier: QualityTier, quality: u8) -> Self {
        Self {
            max_dimension: tier.height(),
            quality,
            preview_hash: false,
        }
    }
}

/// Dimensions of `width × height` after fitting inside `max × max`.
///
/// Never enlarges. Aspect ratio is kept and neither side drops below 1.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let ratio = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    let scaled = |side: u32| ((side as f64 * ratio).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

/// Decode `src`, fit it inside the profile's box and write a JPEG to `dst`.
///
/// EXIF orientation is applied before resizing. The returned metadata
/// carries the *source* dimensions as displayed and, when the
/// profile asks for it, the preview hash of the written image.
pub fn write_bounded_jpeg(
    src: &Path,
    dst: &Path,
    profile: ImageProfile,
) -> MediaResult<ExtractedMetadata> {
    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    // Source files keep whatever extension the storage key had, so sniff the
    // format from the content instead.
    let mut decoder = ImageReader::open(src)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut source = DynamicImage::from_decoder(decoder)?;
    // Camera photos store pixels sideways and rely on the EXIF tag
    source.apply_orientation(orientation);
    let (width, height) = source.dimensions();
    let (target_w, target_h) = fit_within(width, height, profile.max_dimension);

    let output = if (target_w, target_h) == (width, height) {
        source
    } else {
        source.resize(profile.max_dimension, profile.max_dimension, FilterType::Lanczos3)
    };

    encode_jpeg(&output, dst, profile.quality)?;
    debug!(
        src = %src.display(),
        dst = %dst.display(),
        width,
        height,
        out_width = output.width(),
        out_height = output.height(),
        "Wrote bounded JPEG"
    );

    let preview_hash = if profile.preview_hash {
        Some(preview_hash(&output)?)
    } else {
        None
    };

    Ok(ExtractedMetadata {
        width,
        height,
        preview_hash,
    })
}

/// Run [`write_bounded_jpeg`] on the blocking thread pool.
pub async fn render_jpeg(
    src: PathBuf,
    dst: PathBuf,
    profile: ImageProfile,
) -> MediaResult<ExtractedMetadata> {
    tokio::task::spawn_blocking(move || write_bounded_jpeg(&src, &dst, profile))
        .await
        .map_err(|e| MediaError::internal(format!("Image task failed: {}", e)))?
}

fn encode_jpeg(img: &DynamicImage, dst: &Path, quality: u8) -> MediaResult<()> {
    let rgb = img.to_rgb8();
    let mut writer = BufWriter::new(File::create(dst)?);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode_image(&rgb)?;
    Ok(())
}

/// Blurhash of `img` after fitting it inside a 32×32 box.
pub fn preview_hash(img: &DynamicImage) -> MediaResult<String> {
    let tiny = img.thumbnail(PREVIEW_HASH_BOX, PREVIEW_HASH_BOX).to_rgba8();
    blurhash::encode(
        PREVIEW_HASH_COMPONENTS,
        PREVIEW_HASH_COMPONENTS,
        tiny.width(),
        tiny.height(),
        tiny.as_raw(),
    )
    .map_err(|e| MediaError::PreviewHash(format!("{:?}", e)))
}
