//! Thumbnail Service
//!
//! Reacts to finalized uploads in Google Cloud Storage and publishes a fixed
//! set of thumbnails for raster images, PDF documents and DOCX documents.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result, StorageError, ThumbnailError};
