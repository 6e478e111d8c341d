//! Thumbnail generation service
//!
//! This module provides thumbnail generation capabilities:
//! - Processor for the size plan, fit-inside resizing and encoding
//! - Service for coordinating one upload event end to end

pub mod processor;
pub mod service;

pub use processor::{fit_inside, fits, plan, ThumbnailConfig, ThumbnailProcessor};
pub use service::{ThumbnailService, ThumbnailServiceConfig};
