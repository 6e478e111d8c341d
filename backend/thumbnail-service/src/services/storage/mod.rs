//! Object store abstraction
//!
//! The pipeline only needs four operations from the store. Production uses
//! [`GcsClient`]; tests and local runs use [`InMemoryStore`].

pub mod gcs;
pub mod memory;

pub use gcs::{GcsAuth, GcsClient};
pub use memory::InMemoryStore;

use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;

/// Metadata written alongside an uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full content of an object.
    async fn download(&self, bucket: &str, name: &str) -> Result<Bytes, StorageError>;

    /// Create or overwrite an object.
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), StorageError>;

    /// Grant anonymous read access to an object.
    async fn set_public_read(&self, bucket: &str, name: &str) -> Result<(), StorageError>;

    /// Canonical public URL of an object.
    fn public_url(&self, bucket: &str, name: &str) -> String;
}
