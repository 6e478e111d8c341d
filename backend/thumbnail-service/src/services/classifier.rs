//! Format classifier - decides which conversion path an uploaded object takes

use crate::models::is_thumbnail_name;

/// Extensions decoded directly as raster images
pub const RASTER_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "webp", "tiff", "tif", "svg", "bmp",
];

/// Conversion path for a supported object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPath {
    Image,
    Pdf,
    Docx,
}

impl ConversionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionPath::Image => "image",
            ConversionPath::Pdf => "pdf",
            ConversionPath::Docx => "docx",
        }
    }
}

/// Result of classifying an object name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Already a generated thumbnail
    Skip,
    Convert(ConversionPath),
    Unsupported { extension: String },
}

/// Classify an object by name alone.
pub fn classify(object_name: &str) -> Classification {
    if is_thumbnail_name(object_name) {
        return Classification::Skip;
    }

    let extension = match object_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => {
            return Classification::Unsupported {
                extension: String::new(),
            }
        }
    };

    if RASTER_EXTENSIONS.contains(&extension.as_str()) {
        return Classification::Convert(ConversionPath::Image);
    }

    match extension.as_str() {
        "pdf" => Classification::Convert(ConversionPath::Pdf),
        "docx" => Classification::Convert(ConversionPath::Docx),
        _ => Classification::Unsupported { extension },
    }
}
