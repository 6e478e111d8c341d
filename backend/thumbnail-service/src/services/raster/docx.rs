//! DOCX adapter
//!
//! DOCX is converted to a simplified HTML document, printed to an A4 PDF by a
//! headless Chromium (Gotenberg), and the first page is then rasterized like
//! any other PDF. Each stage fails with its own error variant.

use super::{PdfAdapter, RasterImage};
use crate::error::{Result, ThumbnailError};
use async_trait::async_trait;
use bytes::Bytes;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DOCUMENT_PART: &str = "word/document.xml";

/// Converts DOCX bytes into an HTML fragment (blocking)
pub trait DocxConverter: Send + Sync {
    fn to_html(&self, docx: &[u8]) -> Result<String>;
}

/// Prints an HTML document to PDF
#[async_trait]
pub trait HtmlRenderer: Send + Sync {
    async fn render_pdf(&self, html: &str, options: &PdfPageOptions) -> Result<Bytes>;
}

/// Page geometry for HTML printing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPageOptions {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_px: u32,
    pub print_background: bool,
}

impl PdfPageOptions {
    /// A4 portrait with the same margin on every side
    pub fn a4_with_margin(margin_px: u32) -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_px,
            print_background: true,
        }
    }
}

/// Wrap a converted fragment in the fixed print shell (794px is A4 at 96 dpi).
pub fn wrap_html(fragment: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n",
            "body {{ margin: 0; padding: 20px; width: 794px; font-family: Arial, sans-serif; }}\n",
            "img {{ max-width: 100%; height: auto; }}\n",
            "</style>\n</head>\n<body>\n{}\n</body>\n</html>\n"
        ),
        fragment
    )
}

/// DOCX → HTML → PDF → page-1 raster
pub struct DocxAdapter {
    converter: Arc<dyn DocxConverter>,
    renderer: Arc<dyn HtmlRenderer>,
    pdf: PdfAdapter,
}

impl DocxAdapter {
    pub fn new(
        converter: Arc<dyn DocxConverter>,
        renderer: Arc<dyn HtmlRenderer>,
        pdf: PdfAdapter,
    ) -> Self {
        Self {
            converter,
            renderer,
            pdf,
        }
    }

    pub async fn decode(&self, data: Bytes) -> Result<RasterImage> {
        let converter = self.converter.clone();
        let fragment = tokio::task::spawn_blocking(move || converter.to_html(&data)).await??;
        debug!(html_len = fragment.len(), "Converted DOCX to HTML");

        let document = wrap_html(&fragment);
        let pdf = self
            .renderer
            .render_pdf(&document, &PdfPageOptions::a4_with_margin(20))
            .await?;
        debug!(pdf_len = pdf.len(), "Rendered HTML to PDF");

        self.pdf.decode(pdf).await
    }
}

/// Reads `word/document.xml` and keeps the document structure that matters
/// for a first-page preview: headings, paragraphs, list items, tables and
/// bold/italic/underline runs. Images and fine styling are dropped.
#[derive(Debug, Clone, Default)]
pub struct DocxHtmlConverter;

impl DocxHtmlConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DocxConverter for DocxHtmlConverter {
    fn to_html(&self, docx: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(docx))
            .map_err(|e| ThumbnailError::HtmlConversion(format!("not a DOCX archive: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| ThumbnailError::HtmlConversion(format!("{DOCUMENT_PART}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| ThumbnailError::HtmlConversion(format!("{DOCUMENT_PART}: {e}")))?;

        document_xml_to_html(&xml)
    }
}

#[derive(Debug, Default)]
struct RunProps {
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Default)]
struct HtmlWriter {
    out: String,
    paragraph: Option<Paragraph>,
    run: Option<Run>,
    in_text: bool,
    list_open: bool,
}

#[derive(Debug)]
struct Paragraph {
    tag: &'static str,
    list_item: bool,
    content: String,
}

#[derive(Debug, Default)]
struct Run {
    props: RunProps,
    in_props: bool,
    content: String,
}

impl HtmlWriter {
    fn close_list(&mut self) {
        if self.list_open {
            self.out.push_str("</ul>");
            self.list_open = false;
        }
    }

    fn start_element(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<()> {
        match e.local_name().as_ref() {
            b"p" => {
                self.paragraph = Some(Paragraph {
                    tag: "p",
                    list_item: false,
                    content: String::new(),
                });
                if empty {
                    self.end_paragraph();
                }
            }
            b"pStyle" => {
                if let (Some(paragraph), Some(style)) = (self.paragraph.as_mut(), val_attr(e)?) {
                    paragraph.tag = heading_tag(&style).unwrap_or("p");
                }
            }
            b"numPr" => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.list_item = true;
                }
            }
            b"r" if !empty => self.run = Some(Run::default()),
            b"rPr" if !empty => {
                if let Some(run) = self.run.as_mut() {
                    run.in_props = true;
                }
            }
            name @ (b"b" | b"i" | b"u") => {
                let enabled = toggle_enabled(val_attr(e)?.as_deref());
                if let Some(run) = self.run.as_mut().filter(|r| r.in_props) {
                    match name {
                        b"b" => run.props.bold = enabled,
                        b"i" => run.props.italic = enabled,
                        _ => run.props.underline = enabled,
                    }
                }
            }
            b"t" if !empty => self.in_text = true,
            b"br" => self.push_run_markup("<br>"),
            b"tab" => self.push_run_markup(" "),
            b"tbl" if !empty => {
                self.close_list();
                self.out.push_str("<table>");
            }
            b"tr" if !empty => self.out.push_str("<tr>"),
            b"tc" if !empty => self.out.push_str("<td>"),
            _ => {}
        }
        Ok(())
    }

    fn end_element(&mut self, local_name: &[u8]) {
        match local_name {
            b"p" => self.end_paragraph(),
            b"rPr" => {
                if let Some(run) = self.run.as_mut() {
                    run.in_props = false;
                }
            }
            b"r" => self.end_run(),
            b"t" => self.in_text = false,
            b"tbl" => {
                self.close_list();
                self.out.push_str("</table>");
            }
            b"tr" => self.out.push_str("</tr>"),
            b"tc" => {
                self.close_list();
                self.out.push_str("</td>");
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if !self.in_text {
            return;
        }
        if let Some(run) = self.run.as_mut() {
            run.content.push_str(&escape_html(text));
        }
    }

    /// `w:br`/`w:tab` only count inside runs; `w:tabs` in paragraph
    /// properties also contains `w:tab` elements.
    fn push_run_markup(&mut self, markup: &str) {
        if let Some(run) = self.run.as_mut().filter(|r| !r.in_props) {
            run.content.push_str(markup);
        }
    }

    fn end_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let Some(paragraph) = self.paragraph.as_mut() else {
            return;
        };

        let mut html = run.content;
        if run.props.underline {
            html = format!("<u>{html}</u>");
        }
        if run.props.italic {
            html = format!("<em>{html}</em>");
        }
        if run.props.bold {
            html = format!("<strong>{html}</strong>");
        }
        paragraph.content.push_str(&html);
    }

    fn end_paragraph(&mut self) {
        let Some(paragraph) = self.paragraph.take() else {
            return;
        };

        if paragraph.list_item && paragraph.tag == "p" {
            if !self.list_open {
                self.out.push_str("<ul>");
                self.list_open = true;
            }
            self.out.push_str(&format!("<li>{}</li>", paragraph.content));
            return;
        }

        self.close_list();
        self.out.push_str(&format!(
            "<{tag}>{}</{tag}>",
            paragraph.content,
            tag = paragraph.tag
        ));
    }
}

/// Convert the main document part to an HTML fragment.
pub fn document_xml_to_html(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut writer = HtmlWriter::default();
    loop {
        let event = reader.read_event().map_err(|e| {
            ThumbnailError::HtmlConversion(format!(
                "malformed XML at {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => writer.start_element(&e, false)?,
            Event::Empty(e) => writer.start_element(&e, true)?,
            Event::End(e) => writer.end_element(e.local_name().as_ref()),
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| ThumbnailError::HtmlConversion(e.to_string()))?;
                writer.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    writer.close_list();
    Ok(writer.out)
}

fn val_attr(e: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ThumbnailError::HtmlConversion(e.to_string()))?;
        if attr.key.local_name().as_ref() == b"val" {
            let value = attr
                .unescape_value()
                .map_err(|e| ThumbnailError::HtmlConversion(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// `<w:b/>` is on; `w:val="0"`, `"false"` or `"none"` turns it off.
fn toggle_enabled(val: Option<&str>) -> bool {
    !matches!(val, Some("0" | "false" | "none"))
}

fn heading_tag(style_id: &str) -> Option<&'static str> {
    let normalized: String = style_id
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    match normalized.as_str() {
        "title" | "heading1" => Some("h1"),
        "heading2" => Some("h2"),
        "heading3" => Some("h3"),
        "heading4" => Some("h4"),
        "heading5" => Some("h5"),
        "heading6" => Some("h6"),
        _ => None,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Gotenberg's Chromium HTML route
pub struct GotenbergRenderer {
    http_client: Client,
    base_url: String,
}

impl GotenbergRenderer {
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn form(html: &str, options: &PdfPageOptions) -> std::result::Result<Form, reqwest::Error> {
        let index = Part::bytes(html.as_bytes().to_vec())
            .file_name("index.html")
            .mime_str("text/html")?;
        let margin = format!("{}px", options.margin_px);

        Ok(Form::new()
            .part("files", index)
            .text("paperWidth", format!("{}mm", options.width_mm))
            .text("paperHeight", format!("{}mm", options.height_mm))
            .text("marginTop", margin.clone())
            .text("marginBottom", margin.clone())
            .text("marginLeft", margin.clone())
            .text("marginRight", margin)
            .text("printBackground", options.print_background.to_string()))
    }
}

#[async_trait]
impl HtmlRenderer for GotenbergRenderer {
    async fn render_pdf(&self, html: &str, options: &PdfPageOptions) -> Result<Bytes> {
        let form = Self::form(html, options).map_err(|e| ThumbnailError::PdfRender(e.to_string()))?;

        let response = self
            .http_client
            .post(format!("{}/forms/chromium/convert/html", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ThumbnailError::PdfRender(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ThumbnailError::PdfRender(format!(
                "renderer returned {status}: {body}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| ThumbnailError::PdfRender(e.to_string()))
    }
}
