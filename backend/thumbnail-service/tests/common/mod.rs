//! Test doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use thumbnail_service::error::{Result, ThumbnailError};
use thumbnail_service::models::ReportPayload;
use thumbnail_service::services::raster::{
    Adapters, DocxAdapter, DocxHtmlConverter, HtmlRenderer, ImageAdapter, PdfAdapter,
    PdfPageOptions, PdfRasterizer, RasterImage,
};
use thumbnail_service::services::reporter::MetadataReporter;
use thumbnail_service::services::storage::{InMemoryStore, ObjectStore};
use thumbnail_service::services::thumbnail::{
    ThumbnailProcessor, ThumbnailService, ThumbnailServiceConfig,
};

pub const BUCKET: &str = "media-uploads";

pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

/// A DOCX archive holding only `word/document.xml`
pub fn docx_bytes(body: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// Returns a blank page of fixed size and records each request
pub struct FakeRasterizer {
    pub width: u32,
    pub height: u32,
    pub scales: Mutex<Vec<f32>>,
    pub inputs: Mutex<Vec<Vec<u8>>>,
}

impl FakeRasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scales: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }
}

impl PdfRasterizer for FakeRasterizer {
    fn rasterize_first_page(&self, pdf: &[u8], scale: f32) -> Result<RasterImage> {
        self.scales.lock().unwrap().push(scale);
        self.inputs.lock().unwrap().push(pdf.to_vec());
        if !pdf.starts_with(b"%PDF") {
            return Err(ThumbnailError::Rasterize("not a PDF".to_string()));
        }
        RasterImage::new(DynamicImage::new_rgb8(self.width, self.height))
    }
}

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 rendered";

/// Records the printed HTML and answers with a fixed PDF
#[derive(Default)]
pub struct FakeRenderer {
    pub calls: Mutex<Vec<(String, PdfPageOptions)>>,
}

#[async_trait]
impl HtmlRenderer for FakeRenderer {
    async fn render_pdf(&self, html: &str, options: &PdfPageOptions) -> Result<Bytes> {
        self.calls
            .lock()
            .unwrap()
            .push((html.to_string(), *options));
        Ok(Bytes::from_static(FAKE_PDF))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub payloads: Mutex<Vec<ReportPayload>>,
    pub fail: bool,
}

#[async_trait]
impl MetadataReporter for RecordingReporter {
    async fn report(&self, payload: &ReportPayload) -> Result<()> {
        self.payloads.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(ThumbnailError::Report("callback unavailable".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub rasterizer: Arc<FakeRasterizer>,
    pub renderer: Arc<FakeRenderer>,
    pub reporter: Arc<RecordingReporter>,
    pub service: Arc<ThumbnailService>,
}

pub fn adapters(rasterizer: Arc<FakeRasterizer>, renderer: Arc<FakeRenderer>) -> Adapters {
    let pdf = PdfAdapter::new(rasterizer);
    Adapters {
        image: ImageAdapter::new(),
        docx: DocxAdapter::new(Arc::new(DocxHtmlConverter::new()), renderer, pdf.clone()),
        pdf,
    }
}

pub fn service_with(
    store: Arc<dyn ObjectStore>,
    rasterizer: Arc<FakeRasterizer>,
    renderer: Arc<FakeRenderer>,
    reporter: Arc<RecordingReporter>,
) -> ThumbnailService {
    ThumbnailService::new(
        store,
        adapters(rasterizer, renderer),
        ThumbnailProcessor::with_defaults(),
        reporter,
        ThumbnailServiceConfig::default(),
    )
}

/// Store, fakes and service; rasterized pages come out `page_w x page_h`.
pub fn harness(page_w: u32, page_h: u32) -> Harness {
    harness_with_reporter(page_w, page_h, RecordingReporter::default())
}

pub fn harness_with_reporter(page_w: u32, page_h: u32, reporter: RecordingReporter) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let rasterizer = Arc::new(FakeRasterizer::new(page_w, page_h));
    let renderer = Arc::new(FakeRenderer::default());
    let reporter = Arc::new(reporter);
    let service = Arc::new(service_with(
        store.clone(),
        rasterizer.clone(),
        renderer.clone(),
        reporter.clone(),
    ));

    Harness {
        store,
        rasterizer,
        renderer,
        reporter,
        service,
    }
}
