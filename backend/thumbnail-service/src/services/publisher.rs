//! Publisher - writes a thumbnail variant and makes it publicly readable

use crate::error::{Result, ThumbnailError};
use crate::models::{ThumbnailVariant, CACHE_CONTROL};
use crate::services::storage::{ObjectStore, UploadOptions};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload, grant public read, and return the public URL.
    ///
    /// Overwrites any existing object of the same name.
    pub async fn publish(&self, bucket: &str, variant: &ThumbnailVariant) -> Result<String> {
        let name = &variant.destination_name;
        let options = UploadOptions {
            content_type: variant.content_type.clone(),
            cache_control: CACHE_CONTROL.to_string(),
        };
        let publish_error = |source| ThumbnailError::Publish {
            size: variant.size_label.to_string(),
            source,
        };

        self.store
            .upload(bucket, name, variant.bytes.clone(), &options)
            .await
            .map_err(publish_error)?;
        self.store
            .set_public_read(bucket, name)
            .await
            .map_err(publish_error)?;

        let url = self.store.public_url(bucket, name);
        debug!(bucket = %bucket, name = %name, url = %url, "Thumbnail published");
        Ok(url)
    }
}
