//! Image transform pipeline: decoded raster in, lossy-encoded bytes (or a
//! skip signal) out.
//!
//! The steps run in a fixed order and each is independently skippable:
//! color normalization to plain RGB, grayscale conversion, resolution
//! scaling, JPEG encode at the configured quality.

use image::{imageops::FilterType, DynamicImage};

use crate::config::TransformConfig;
use crate::error::TransformError;

/// Result of running the pipeline over one decoded raster.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Freshly encoded replacement bytes.
    Encoded(EncodedRaster),
    /// Leave the original resource unchanged.
    Skip(SkipReason),
}

/// A re-encoded raster ready to be spliced back into the document.
#[derive(Debug, Clone)]
pub struct EncodedRaster {
    /// JPEG byte stream.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// True when the stream is single-channel (DeviceGray).
    pub grayscale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Source width or height was already <= 1.
    DegenerateSource { width: u32, height: u32 },
    /// Configured scale would round the image down to <= 1 on an axis.
    DegenerateTarget { width: u32, height: u32 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DegenerateSource { width, height } => {
                write!(f, "source dimensions {}x{} too small", width, height)
            }
            SkipReason::DegenerateTarget { width, height } => {
                write!(f, "scaled dimensions {}x{} too small", width, height)
            }
        }
    }
}

/// Run the full pipeline over a decoded raster.
///
/// The input is never mutated; the function returns fresh encoded bytes or
/// signals that the caller should leave the resource untouched.
pub fn apply(raster: &DynamicImage, config: &TransformConfig) -> Result<Outcome, TransformError> {
    let (width, height) = (raster.width(), raster.height());
    if width <= 1 || height <= 1 {
        return Ok(Outcome::Skip(SkipReason::DegenerateSource { width, height }));
    }

    // Anything that is not a plain interleaved RGB or 8-bit gray buffer gets
    // normalized to RGB first. Alpha is discarded here.
    let mut working = match raster {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => raster.clone(),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    if config.grayscale && !matches!(working, DynamicImage::ImageLuma8(_)) {
        working = DynamicImage::ImageLuma8(working.to_luma8());
    }

    if config.scale < 1.0 {
        let new_width = (working.width() as f32 * config.scale).floor() as u32;
        let new_height = (working.height() as f32 * config.scale).floor() as u32;
        if new_width <= 1 || new_height <= 1 {
            return Ok(Outcome::Skip(SkipReason::DegenerateTarget {
                width: new_width,
                height: new_height,
            }));
        }
        working = working.resize_exact(new_width, new_height, FilterType::Lanczos3);
    }

    encode_jpeg(&working, config.jpeg_quality()).map(Outcome::Encoded)
}

/// One encode call per image; quality maps directly onto the codec's 1-100
/// compression-quality parameter.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedRaster, TransformError> {
    let (width, height) = (img.width(), img.height());
    let w = u16::try_from(width)
        .map_err(|_| TransformError::Encode(format!("width {} exceeds JPEG limit", width)))?;
    let h = u16::try_from(height)
        .map_err(|_| TransformError::Encode(format!("height {} exceeds JPEG limit", height)))?;

    let mut jpeg_bytes = Vec::new();
    match img {
        DynamicImage::ImageLuma8(gray) => {
            let encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
            encoder
                .encode(gray.as_raw(), w, h, jpeg_encoder::ColorType::Luma)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            Ok(EncodedRaster {
                data: jpeg_bytes,
                width,
                height,
                grayscale: true,
            })
        }
        other => {
            let rgb = other.to_rgb8();
            let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
            encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
            encoder
                .encode(rgb.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            Ok(EncodedRaster {
                data: jpeg_bytes,
                width,
                height,
                grayscale: false,
            })
        }
    }
}
