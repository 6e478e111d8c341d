//! PDF adapter - renders the first page of a document through pdfium

use super::{RasterImage, RASTER_SCALE};
use crate::error::{Result, ThumbnailError};
use bytes::Bytes;
use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Renders page 1 of a PDF into pixels
///
/// Implementations are blocking; callers run them on the blocking pool.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize_first_page(&self, pdf: &[u8], scale: f32) -> Result<RasterImage>;
}

/// pdfium-backed rasterizer
pub struct PdfiumRasterizer {
    pdfium: Option<Pdfium>,
}

impl PdfiumRasterizer {
    /// Bind to pdfium in `library_dir`, falling back to the system library.
    ///
    /// A failed binding is logged; every later rasterization then fails with
    /// [`ThumbnailError::Rasterize`] instead of aborting startup.
    pub fn new(library_dir: Option<&str>) -> Self {
        let bindings = match library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        };

        let pdfium = bindings
            .map(Pdfium::new)
            .map_err(|e| error!(error = %e, "Failed to bind pdfium"))
            .ok();

        if pdfium.is_some() {
            info!("pdfium bound");
        }

        Self { pdfium }
    }

    pub fn is_available(&self) -> bool {
        self.pdfium.is_some()
    }
}

impl PdfRasterizer for PdfiumRasterizer {
    #[allow(clippy::cast_sign_loss)]
    fn rasterize_first_page(&self, pdf: &[u8], scale: f32) -> Result<RasterImage> {
        let pdfium = self
            .pdfium
            .as_ref()
            .ok_or_else(|| ThumbnailError::Rasterize("pdfium library is not bound".to_string()))?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| ThumbnailError::Rasterize(e.to_string()))?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err(ThumbnailError::PageNotFound);
        }

        let page = pages.first().map_err(|_| ThumbnailError::PageNotFound)?;
        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
            .map_err(|e| ThumbnailError::Rasterize(e.to_string()))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| ThumbnailError::Rasterize("pixel buffer mismatch".to_string()))?;

        debug!(width, height, scale, "Rasterized first PDF page");
        RasterImage::new(DynamicImage::ImageRgba8(rgba))
    }
}

/// Runs a [`PdfRasterizer`] at [`RASTER_SCALE`] off the async runtime
#[derive(Clone)]
pub struct PdfAdapter {
    rasterizer: Arc<dyn PdfRasterizer>,
}

impl PdfAdapter {
    pub fn new(rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        Self { rasterizer }
    }

    pub async fn decode(&self, data: Bytes) -> Result<RasterImage> {
        let rasterizer = self.rasterizer.clone();
        tokio::task::spawn_blocking(move || rasterizer.rasterize_first_page(&data, RASTER_SCALE))
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRasterizer {
        scales: Mutex<Vec<f32>>,
    }

    impl PdfRasterizer for RecordingRasterizer {
        fn rasterize_first_page(&self, _pdf: &[u8], scale: f32) -> Result<RasterImage> {
            self.scales.lock().unwrap().push(scale);
            RasterImage::new(DynamicImage::new_rgb8(1836, 2376))
        }
    }

    #[tokio::test]
    async fn test_adapter_requests_triple_scale() {
        let rasterizer = Arc::new(RecordingRasterizer {
            scales: Mutex::new(Vec::new()),
        });
        let adapter = PdfAdapter::new(rasterizer.clone());

        let raster = adapter.decode(Bytes::from_static(b"%PDF-1.7")).await.unwrap();

        assert_eq!(raster.width(), 1836);
        assert_eq!(*rasterizer.scales.lock().unwrap(), vec![3.0]);
    }

    #[test]
    fn test_unbound_pdfium_is_rasterize_error() {
        let rasterizer = PdfiumRasterizer { pdfium: None };
        let err = rasterizer.rasterize_first_page(b"%PDF-1.7", 3.0).unwrap_err();
        assert!(matches!(err, ThumbnailError::Rasterize(_)));
    }

    #[test]
    fn test_pdfium_rasterizer_shared_across_blocking_tasks() {
        fn assert_shareable<T: Send + Sync + 'static>() {}
        assert_shareable::<PdfiumRasterizer>();

        let adapter = PdfAdapter::new(Arc::new(PdfiumRasterizer { pdfium: None }));
        let _ = adapter.clone();
    }
}
