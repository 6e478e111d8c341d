//! In-memory object store used by tests and local dry runs

use super::{ObjectStore, UploadOptions};
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// A stored object and its write metadata
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub options: Option<UploadOptions>,
    pub public: bool,
}

/// Process-local store keyed by `(bucket, name)`
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    uploads: RwLock<Vec<(String, String)>>,
    failing_uploads: RwLock<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as if it had been uploaded by a user.
    pub fn insert(&self, bucket: &str, name: &str, data: impl Into<Bytes>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(
                (bucket.to_string(), name.to_string()),
                StoredObject {
                    data: data.into(),
                    options: None,
                    public: false,
                },
            );
        }
    }

    /// Make every upload to `name` fail.
    pub fn fail_uploads_to(&self, name: &str) {
        if let Ok(mut failing) = self.failing_uploads.write() {
            failing.insert(name.to_string());
        }
    }

    pub fn get(&self, bucket: &str, name: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .ok()?
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
    }

    /// Names in `bucket`, sorted.
    pub fn names(&self, bucket: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .read()
            .map(|objects| {
                objects
                    .keys()
                    .filter(|(b, _)| b == bucket)
                    .map(|(_, n)| n.clone())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Every upload in call order, including overwrites.
    pub fn upload_log(&self) -> Vec<(String, String)> {
        self.uploads
            .read()
            .map(|uploads| uploads.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn download(&self, bucket: &str, name: &str) -> Result<Bytes, StorageError> {
        self.get(bucket, name)
            .map(|object| object.data)
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let failing = self
            .failing_uploads
            .read()
            .map(|failing| failing.contains(name))
            .unwrap_or(false);
        if failing {
            return Err(StorageError::Status {
                status: 429,
                body: "quota exceeded".to_string(),
            });
        }

        if let Ok(mut uploads) = self.uploads.write() {
            uploads.push((bucket.to_string(), name.to_string()));
        }
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(
                (bucket.to_string(), name.to_string()),
                StoredObject {
                    data,
                    options: Some(options.clone()),
                    public: false,
                },
            );
        }
        Ok(())
    }

    async fn set_public_read(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(|_| StorageError::Status {
            status: 500,
            body: "store lock poisoned".to_string(),
        })?;

        match objects.get_mut(&(bucket.to_string(), name.to_string())) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("https://storage.googleapis.com/{bucket}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_overwrites_and_logs() {
        let store = InMemoryStore::new();
        let options = UploadOptions {
            content_type: "image/png".to_string(),
            cache_control: "public, max-age=3600".to_string(),
        };

        tokio_test::assert_ok!(
            store
                .upload("b", "a.png", Bytes::from_static(b"one"), &options)
                .await
        );
        tokio_test::assert_ok!(
            store
                .upload("b", "a.png", Bytes::from_static(b"two"), &options)
                .await
        );

        assert_eq!(store.names("b"), vec!["a.png".to_string()]);
        assert_eq!(store.upload_log().len(), 2);
        assert_eq!(store.download("b", "a.png").await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_set_public_read_requires_object() {
        let store = InMemoryStore::new();
        let err = store.set_public_read("b", "missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_failing_upload() {
        let store = InMemoryStore::new();
        store.fail_uploads_to("bad.png");
        let options = UploadOptions {
            content_type: "image/png".to_string(),
            cache_control: "public, max-age=3600".to_string(),
        };

        let err = store
            .upload("b", "bad.png", Bytes::from_static(b"x"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Status { status: 429, .. }));
        assert!(store.get("b", "bad.png").is_none());
    }
}
