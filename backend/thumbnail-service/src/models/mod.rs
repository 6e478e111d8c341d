//! Domain types shared by the thumbnail pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token embedded in every generated object name.
pub const THUMBNAIL_MARKER: &str = "u_thumbnail";

/// Cache directive applied to every published thumbnail.
pub const CACHE_CONTROL: &str = "public, max-age=3600";

/// Fixed target sizes, in generation order.
pub const TARGET_SIZES: [TargetSize; 5] = [
    TargetSize::new("150x150", 150, 150),
    TargetSize::new("300x300", 300, 300),
    TargetSize::new("600x600", 600, 600),
    TargetSize::new("640x360", 640, 360),
    TargetSize::new("1280x720", 1280, 720),
];

/// Returns true when `name` is one of our own generated thumbnails.
pub fn is_thumbnail_name(name: &str) -> bool {
    name.contains(&format!("_{THUMBNAIL_MARKER}"))
}

/// An uploaded object as identified by the trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub bucket: String,
    pub name: String,
    /// Lowercased text after the final `.`, empty when there is none
    pub extension: String,
}

impl SourceObject {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        Self {
            bucket: bucket.into(),
            name,
            extension,
        }
    }

    /// Name with only the final `.ext` segment removed.
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.name)
    }

    /// `gs://bucket/name`, used in log lines.
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Deterministic destination for one thumbnail of this object.
    pub fn destination_name(&self, target: &TargetSize, extension: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            self.stem(),
            target.label,
            THUMBNAIL_MARKER,
            extension
        )
    }
}

/// One entry of the target size list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(label: &'static str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
        }
    }
}

/// Encoding of the generated thumbnails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Keep the source extension (image path)
    Source(String),
    /// Always PNG (rasterized documents)
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Source(ext) => ext,
            OutputFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> String {
        format!("image/{}", self.extension())
    }
}

/// A resized, encoded thumbnail ready to be published.
#[derive(Debug, Clone)]
pub struct ThumbnailVariant {
    pub size_label: &'static str,
    pub bytes: bytes::Bytes,
    pub content_type: String,
    pub destination_name: String,
    pub width: u32,
    pub height: u32,
}

/// Size label to public URL, accumulated over one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailIndex(BTreeMap<String, String>);

impl ThumbnailIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, size_label: &str, url: String) {
        self.0.insert(size_label.to_string(), url);
    }

    pub fn get(&self, size_label: &str) -> Option<&str> {
        self.0.get(size_label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Body handed to the metadata collaborator.
///
/// Keys of `thumbnails` are `s<W>x<H>`, the form downstream consumers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub name: String,
    pub thumbnails: BTreeMap<String, String>,
}

impl ReportPayload {
    pub fn new(name: impl Into<String>, index: &ThumbnailIndex) -> Self {
        Self {
            name: name.into(),
            thumbnails: index
                .iter()
                .map(|(label, url)| (format!("s{label}"), url.to_string()))
                .collect(),
        }
    }
}

/// Stage at which an invocation was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Download,
    Decode,
}

impl FailedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStage::Download => "download",
            FailedStage::Decode => "decode",
        }
    }
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Object is one of our own thumbnails
    Skipped,
    /// Extension has no conversion path
    Unsupported { extension: String },
    /// Decoded and ran generation; individual sizes may still have failed
    Completed {
        index: ThumbnailIndex,
        skipped: usize,
        failed: usize,
    },
    /// Aborted before any write
    Failed { stage: FailedStage, error: String },
}

impl InvocationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            InvocationOutcome::Skipped => "skipped",
            InvocationOutcome::Unsupported { .. } => "unsupported",
            InvocationOutcome::Completed { failed: 0, .. } => "completed",
            InvocationOutcome::Completed { .. } => "partial",
            InvocationOutcome::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        let source = SourceObject::new("bucket", "uploads/Photo.JPG");
        assert_eq!(source.extension, "jpg");
        assert_eq!(source.stem(), "uploads/Photo");
    }

    #[test]
    fn test_stem_keeps_inner_dots() {
        let source = SourceObject::new("bucket", "a.b.c/report.v2.final.pdf");
        assert_eq!(source.stem(), "a.b.c/report.v2.final");
        assert_eq!(source.extension, "pdf");
    }

    #[test]
    fn test_name_without_extension() {
        let source = SourceObject::new("bucket", "README");
        assert_eq!(source.extension, "");
        assert_eq!(source.stem(), "README");
    }

    #[test]
    fn test_destination_name_format() {
        let source = SourceObject::new("bucket", "photo.jpg");
        let name = source.destination_name(&TARGET_SIZES[0], "jpg");
        assert_eq!(name, "photo_150x150_u_thumbnail.jpg");
        assert!(is_thumbnail_name(&name));
    }

    #[test]
    fn test_marker_detection_ignores_lookalikes() {
        assert!(!is_thumbnail_name("menu_thumbnail.png"));
        assert!(is_thumbnail_name("cover_150x150_u_thumbnail.png"));
    }

    #[test]
    fn test_output_format_content_type() {
        assert_eq!(OutputFormat::Source("jpg".into()).content_type(), "image/jpg");
        assert_eq!(OutputFormat::Png.content_type(), "image/png");
        assert_eq!(OutputFormat::Png.extension(), "png");
    }

    #[test]
    fn test_report_payload_prefixes_labels() {
        let mut index = ThumbnailIndex::new();
        index.insert("150x150", "https://example/a".to_string());
        index.insert("1280x720", "https://example/b".to_string());

        let payload = ReportPayload::new("photo.jpg", &index);
        assert_eq!(payload.thumbnails.len(), 2);
        assert_eq!(payload.thumbnails["s150x150"], "https://example/a");
        assert_eq!(payload.thumbnails["s1280x720"], "https://example/b");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["name"], "photo.jpg");
    }

    #[test]
    fn test_outcome_labels() {
        let completed = InvocationOutcome::Completed {
            index: ThumbnailIndex::new(),
            skipped: 5,
            failed: 0,
        };
        assert_eq!(completed.label(), "completed");

        let partial = InvocationOutcome::Completed {
            index: ThumbnailIndex::new(),
            skipped: 0,
            failed: 1,
        };
        assert_eq!(partial.label(), "partial");
    }
}
