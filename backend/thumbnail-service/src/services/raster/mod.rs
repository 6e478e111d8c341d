//! Rasterizer adapters
//!
//! Each conversion path turns the downloaded bytes into one [`RasterImage`].
//! Everything after this point is format-agnostic.

pub mod docx;
pub mod image;
pub mod pdf;

pub use self::docx::{
    DocxAdapter, DocxConverter, DocxHtmlConverter, GotenbergRenderer, HtmlRenderer,
    PdfPageOptions,
};
pub use self::image::ImageAdapter;
pub use self::pdf::{PdfAdapter, PdfRasterizer, PdfiumRasterizer};

use crate::error::{Result, ThumbnailError};
use crate::models::{OutputFormat, SourceObject};
use crate::services::classifier::ConversionPath;
use ::image::{DynamicImage, GenericImageView};
use bytes::Bytes;

/// Scale factor applied when rasterizing the first page of a document
pub const RASTER_SCALE: f32 = 3.0;

/// Decoded pixels of the source object, with non-zero dimensions
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
    width: u32,
    height: u32,
}

impl RasterImage {
    pub fn new(image: DynamicImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ThumbnailError::Decode(format!(
                "image has empty dimensions {width}x{height}"
            )));
        }

        Ok(Self {
            image,
            width,
            height,
        })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// The three adapters, selected by conversion path
pub struct Adapters {
    pub image: ImageAdapter,
    pub pdf: PdfAdapter,
    pub docx: DocxAdapter,
}

impl Adapters {
    pub async fn decode(
        &self,
        path: ConversionPath,
        source: &SourceObject,
        data: Bytes,
    ) -> Result<RasterImage> {
        match path {
            ConversionPath::Image => self.image.decode(data, &source.extension).await,
            ConversionPath::Pdf => self.pdf.decode(data).await,
            ConversionPath::Docx => self.docx.decode(data).await,
        }
    }
}

/// Image path keeps the source extension; documents become PNG.
pub fn output_format(path: ConversionPath, source: &SourceObject) -> OutputFormat {
    match path {
        ConversionPath::Image => OutputFormat::Source(source.extension.clone()),
        ConversionPath::Pdf | ConversionPath::Docx => OutputFormat::Png,
    }
}
