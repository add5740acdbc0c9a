//! JPEG thumbnail encoder.
//!
//! Takes an already decoded, orientation-corrected raster and produces a
//! bounded JPEG.
//!
//! # Design Decisions
//!
//! - **Fit, never fill**: the longer side is bounded by `max_dimension`,
//!   aspect ratio is preserved, and small sources are never upscaled.
//!
//! - **RGB only**: alpha is dropped before encoding since JPEG has no alpha.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::ThumbnailError;

/// Default bound on the longer side of a thumbnail, in pixels.
pub const DEFAULT_THUMB_SIZE: u32 = 320;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Encoder
// =============================================================================

/// Resizes and JPEG-encodes decoded frames.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailEncoder {
    max_dimension: u32,
    quality: u8,
}

impl ThumbnailEncoder {
    /// Create an encoder; quality is clamped to 1-100 and the bound to at least 1.
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality: clamp_quality(quality),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Shrink `img` to fit the bound and encode it.
    pub fn encode(&self, img: DynamicImage) -> Result<Bytes, ThumbnailError> {
        let (width, height) = (img.width(), img.height());
        let (target_w, target_h) = fit_within(width, height, self.max_dimension);

        let img = if (target_w, target_h) == (width, height) {
            img
        } else {
            img.resize_exact(target_w, target_h, FilterType::Triangle)
        };

        encode_jpeg(&img, self.quality)
    }

    /// Encode `img` at full size (RAW previews).
    pub fn encode_full(&self, img: &DynamicImage) -> Result<Bytes, ThumbnailError> {
        encode_jpeg(img, self.quality)
    }
}

impl Default for ThumbnailEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_THUMB_SIZE, DEFAULT_JPEG_QUALITY)
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, ThumbnailError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ThumbnailError::Encode {
            message: "empty image".to_string(),
        });
    }

    let rgb = img.to_rgb8();
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);

    encoder
        .encode_image(&rgb)
        .map_err(|e| ThumbnailError::Encode {
            message: e.to_string(),
        })?;

    Ok(Bytes::from(output))
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Dimensions of `width` x `height` scaled so the longer side is at most `max`.
///
/// Aspect ratio is preserved (rounded), no side drops below 1, and images
/// already within the bound are returned unchanged.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max || longer == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let scaled = (side as u64 * max as u64 + longer as u64 / 2) / longer as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (max, scale(height))
    } else {
        (scale(width), max)
    }
}

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
