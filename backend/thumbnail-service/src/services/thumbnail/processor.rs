//! Thumbnail processor - generates the fixed size variants of one raster image
//!
//! A size is only produced when the source covers it in both dimensions; the
//! image is then shrunk to fit inside the target box keeping its aspect ratio
//! and encoded in the output format.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use crate::error::{Result, ThumbnailError};
use crate::models::{OutputFormat, SourceObject, TargetSize, ThumbnailVariant};
use crate::services::raster::RasterImage;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Configuration for thumbnail generation
#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

/// True when the source is at least as large as the target in both dimensions.
pub fn fits(width: u32, height: u32, target: &TargetSize) -> bool {
    width >= target.width && height >= target.height
}

/// Sizes that survive the skip rule, in list order.
pub fn plan(width: u32, height: u32, targets: &[TargetSize]) -> Vec<TargetSize> {
    targets
        .iter()
        .filter(|target| fits(width, height, target))
        .copied()
        .collect()
}

/// Largest dimensions with the source aspect ratio inside `max_w x max_h`,
/// never enlarging and never below 1px.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn fit_inside(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale = (f64::from(max_w) / f64::from(width))
        .min(f64::from(max_h) / f64::from(height))
        .min(1.0);

    let new_w = (f64::from(width) * scale).round() as u32;
    let new_h = (f64::from(height) * scale).round() as u32;

    (new_w.clamp(1, max_w.max(1)), new_h.clamp(1, max_h.max(1)))
}

/// Thumbnail processor
pub struct ThumbnailProcessor {
    config: ThumbnailConfig,
}

impl ThumbnailProcessor {
    /// Create a new processor with the given configuration
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Create a processor with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ThumbnailConfig::default())
    }

    /// Resize and encode one size (blocking version)
    ///
    /// **Note:** This method performs CPU-intensive operations and should not be called
    /// directly from async code. Use `render_async` instead.
    pub fn render(
        &self,
        raster: &RasterImage,
        target: &TargetSize,
        source: &SourceObject,
        format: &OutputFormat,
    ) -> Result<ThumbnailVariant> {
        let (width, height) = fit_inside(raster.width(), raster.height(), target.width, target.height);

        let resized = raster
            .image()
            .resize_exact(width, height, FilterType::Lanczos3);

        let bytes = self.encode(&resized, format).map_err(|reason| ThumbnailError::Encode {
            size: target.label.to_string(),
            reason,
        })?;

        debug!(
            size = target.label,
            width,
            height,
            bytes = bytes.len(),
            "Thumbnail generated"
        );

        Ok(ThumbnailVariant {
            size_label: target.label,
            bytes,
            content_type: format.content_type(),
            destination_name: source.destination_name(target, format.extension()),
            width,
            height,
        })
    }

    /// Resize and encode one size on the blocking thread pool
    pub async fn render_async(
        self: Arc<Self>,
        raster: Arc<RasterImage>,
        target: TargetSize,
        source: Arc<SourceObject>,
        format: OutputFormat,
    ) -> Result<ThumbnailVariant> {
        tokio::task::spawn_blocking(move || self.render(&raster, &target, &source, &format)).await?
    }

    /// Generate every surviving size sequentially (blocking version)
    ///
    /// Sizes larger than the source are skipped and produce no entry.
    pub fn generate(
        &self,
        raster: &RasterImage,
        targets: &[TargetSize],
        source: &SourceObject,
        format: &OutputFormat,
    ) -> Vec<Result<ThumbnailVariant>> {
        plan(raster.width(), raster.height(), targets)
            .iter()
            .map(|target| self.render(raster, target, source, format))
            .collect()
    }

    /// Encode in the output format
    fn encode(&self, img: &DynamicImage, format: &OutputFormat) -> std::result::Result<Bytes, String> {
        let mut buf = Vec::new();

        let image_format = match format.extension() {
            "jpg" | "jpeg" => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality);
                DynamicImage::ImageRgb8(img.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(|e| e.to_string())?;
                return Ok(Bytes::from(buf));
            }
            // Vector sources have no raster encoder of their own
            "png" | "svg" => ImageFormat::Png,
            "gif" => ImageFormat::Gif,
            "webp" => ImageFormat::WebP,
            "tiff" | "tif" => ImageFormat::Tiff,
            "bmp" => ImageFormat::Bmp,
            other => return Err(format!("no encoder for .{other}")),
        };

        DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), image_format)
            .map_err(|e| e.to_string())?;

        Ok(Bytes::from(buf))
    }
}
