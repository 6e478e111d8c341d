//! Image adapter - decodes raster formats and renders SVG

use super::RasterImage;
use crate::error::{Result, ThumbnailError};
use bytes::Bytes;
use image::{DynamicImage, RgbaImage};
use resvg::{tiny_skia, usvg};
use tracing::debug;

/// Decodes uploaded images into a [`RasterImage`]
#[derive(Debug, Clone, Default)]
pub struct ImageAdapter;

impl ImageAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Decode on the blocking pool.
    pub async fn decode(&self, data: Bytes, extension: &str) -> Result<RasterImage> {
        let is_svg = extension == "svg";
        tokio::task::spawn_blocking(move || {
            if is_svg {
                decode_svg(&data)
            } else {
                decode_raster(&data)
            }
        })
        .await?
    }
}

/// Decode any format the `image` crate recognises by content.
pub fn decode_raster(data: &[u8]) -> Result<RasterImage> {
    let img = image::load_from_memory(data)
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    debug!(width = img.width(), height = img.height(), "Decoded raster image");
    RasterImage::new(img)
}

/// Render an SVG document at its natural size.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn decode_svg(data: &[u8]) -> Result<RasterImage> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_data(data, &options)
        .map_err(|e| ThumbnailError::Decode(format!("invalid SVG: {e}")))?;

    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| ThumbnailError::Decode("SVG has empty dimensions".to_string()))?;

    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let rgba = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or_else(|| ThumbnailError::Decode("SVG pixel buffer mismatch".to_string()))?;

    debug!(width = rgba.width(), height = rgba.height(), "Rendered SVG");
    RasterImage::new(DynamicImage::ImageRgba8(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_decode_png() {
        let raster = ImageAdapter::new()
            .decode(Bytes::from(png_bytes(32, 16)), "png")
            .await
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (32, 16));
    }

    #[tokio::test]
    async fn test_decode_garbage_is_decode_error() {
        let err = ImageAdapter::new()
            .decode(Bytes::from_static(b"definitely not an image"), "jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Decode(_)));
    }

    #[tokio::test]
    async fn test_decode_svg_natural_size() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">
            <rect width="200" height="100" fill="red"/>
        </svg>"#;

        let raster = ImageAdapter::new()
            .decode(Bytes::from_static(svg), "svg")
            .await
            .unwrap();
        assert_eq!((raster.width(), raster.height()), (200, 100));
    }

    #[test]
    fn test_invalid_svg_is_decode_error() {
        let err = decode_svg(b"<svg").unwrap_err();
        assert!(matches!(err, ThumbnailError::Decode(_)));
    }
}
