/// Error types for Thumbnail Service
///
/// Pipeline failures are described by [`ThumbnailError`]; they are logged and
/// swallowed at the invocation boundary. [`AppError`] is the HTTP-facing error
/// returned by the event endpoint when a delivery itself is malformed.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, ThumbnailError>;

/// Object store failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: gs://{bucket}/{name}")]
    NotFound { bucket: String, name: String },

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("storage authentication failed: {0}")]
    Auth(String),
}

/// Failures of a single thumbnail invocation
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("failed to download source: {0}")]
    Download(#[source] StorageError),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to rasterize PDF: {0}")]
    Rasterize(String),

    #[error("PDF has no pages")]
    PageNotFound,

    #[error("failed to convert DOCX to HTML: {0}")]
    HtmlConversion(String),

    #[error("failed to render HTML to PDF: {0}")]
    PdfRender(String),

    #[error("failed to encode {size} thumbnail: {reason}")]
    Encode { size: String, reason: String },

    #[error("failed to publish {size} thumbnail: {source}")]
    Publish {
        size: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to report thumbnails: {0}")]
    Report(String),

    #[error("blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ThumbnailError {
    /// Short stable label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ThumbnailError::Download(_) => "download",
            ThumbnailError::Decode(_) => "decode",
            ThumbnailError::Rasterize(_) => "rasterize",
            ThumbnailError::PageNotFound => "page_not_found",
            ThumbnailError::HtmlConversion(_) => "html_conversion",
            ThumbnailError::PdfRender(_) => "pdf_render",
            ThumbnailError::Encode { .. } => "encode",
            ThumbnailError::Publish { .. } => "publish",
            ThumbnailError::Report(_) => "report",
            ThumbnailError::TaskJoin(_) => "task_join",
        }
    }
}

/// HTTP-facing errors of the event endpoint
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Internal(_) => "server_error",
        };

        HttpResponse::build(status).json(ErrorBody {
            error,
            message: self.to_string(),
            status: status.as_u16(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
