//! GCS client for thumbnail operations
//!
//! Talks to the GCS JSON API. Credentials come from Application Default
//! Credentials; anonymous mode exists for local emulators.

use super::{ObjectStore, UploadOptions};
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use gcp_auth::TokenProvider;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Changing object ACLs needs full control
const STORAGE_SCOPES: &[&str] = &["https://www.googleapis.com/auth/devstorage.full_control"];

const BOUNDARY_PREFIX: &str = "thumbnail_service_boundary_";

/// How requests are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcsAuth {
    /// Application Default Credentials (Workload Identity, service account file)
    Adc,
    /// No credentials, for fake-gcs-server and similar emulators
    Anonymous,
}

/// GCS client for downloading, uploading and publishing objects
pub struct GcsClient {
    http_client: Client,
    api_base: String,
    public_host: String,
    auth: GcsAuth,
    token_provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl GcsClient {
    /// Create a new GCS client
    ///
    /// `api_base` is the JSON API origin (`https://storage.googleapis.com`),
    /// `public_host` the host used in public object URLs.
    pub fn new(
        api_base: &str,
        public_host: &str,
        auth: GcsAuth,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        info!(api_base = %api_base, auth = ?auth, "GCS client initialized");

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            public_host: public_host.to_string(),
            auth,
            token_provider: OnceCell::new(),
        })
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StorageError> {
        match self.auth {
            GcsAuth::Anonymous => Ok(request),
            GcsAuth::Adc => {
                let provider = self
                    .token_provider
                    .get_or_try_init(|| async { gcp_auth::provider().await })
                    .await
                    .map_err(|e| StorageError::Auth(e.to_string()))?;

                let token = provider
                    .token(STORAGE_SCOPES)
                    .await
                    .map_err(|e| StorageError::Auth(e.to_string()))?;

                Ok(request.bearer_auth(token.as_str()))
            }
        }
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        )
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.api_base,
            urlencoding::encode(bucket)
        )
    }
}

/// Map non-success responses onto storage errors
async fn check_status(
    response: Response,
    bucket: &str,
    name: &str,
) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound {
            bucket: bucket.to_string(),
            name: name.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StorageError::Auth(format!("{status}: {body}")));
    }

    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

/// First `thumbnail_service_boundary_<n>` that does not occur in the payload.
fn multipart_boundary(data: &[u8]) -> String {
    (0u64..)
        .map(|n| format!("{BOUNDARY_PREFIX}{n}"))
        .find(|candidate| {
            !data
                .windows(candidate.len())
                .any(|window| window == candidate.as_bytes())
        })
        .unwrap_or_else(|| BOUNDARY_PREFIX.to_string())
}

/// Build a `multipart/related` body: JSON metadata part followed by the media.
fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn download(&self, bucket: &str, name: &str) -> Result<Bytes, StorageError> {
        debug!(bucket = %bucket, name = %name, "Downloading from GCS");

        let request = self
            .http_client
            .get(self.object_url(bucket, name))
            .query(&[("alt", "media")]);
        let response = self.authorize(request).await?.send().await?;
        let response = check_status(response, bucket, name).await?;
        let bytes = response.bytes().await?;

        debug!(bucket = %bucket, name = %name, size = bytes.len(), "Downloaded from GCS");
        Ok(bytes)
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let size = data.len();
        debug!(bucket = %bucket, name = %name, size, "Uploading to GCS");

        let metadata = json!({
            "name": name,
            "contentType": options.content_type,
            "cacheControl": options.cache_control,
        });
        let boundary = multipart_boundary(&data);
        let body = multipart_related_body(&boundary, &metadata, &options.content_type, &data);

        let request = self
            .http_client
            .post(self.upload_url(bucket))
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);
        let response = self.authorize(request).await?.send().await?;
        check_status(response, bucket, name).await?;

        info!(bucket = %bucket, name = %name, size, "Uploaded to GCS");
        Ok(())
    }

    async fn set_public_read(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        let request = self
            .http_client
            .post(format!("{}/acl", self.object_url(bucket, name)))
            .json(&json!({ "entity": "allUsers", "role": "READER" }));
        let response = self.authorize(request).await?.send().await?;
        check_status(response, bucket, name).await?;

        debug!(bucket = %bucket, name = %name, "Object set to public-read");
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("https://{}/{}/{}", self.public_host, bucket, name)
    }
}
