//! Result reporter - hands `{name, thumbnails}` to the metadata collaborator

use crate::error::{Result, ThumbnailError};
use crate::models::ReportPayload;
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, warn};

#[async_trait]
pub trait MetadataReporter: Send + Sync {
    async fn report(&self, payload: &ReportPayload) -> Result<()>;
}

/// Logs the payload; used when no callback is configured
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

#[async_trait]
impl MetadataReporter for LogReporter {
    async fn report(&self, payload: &ReportPayload) -> Result<()> {
        let thumbnails = serde_json::to_string(&payload.thumbnails)
            .map_err(|e| ThumbnailError::Report(e.to_string()))?;

        info!(
            name = %payload.name,
            count = payload.thumbnails.len(),
            thumbnails = %thumbnails,
            "Thumbnails ready"
        );
        Ok(())
    }
}

/// Retry policy for the metadata callback
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Content-derived key: identical results always produce the same key.
pub fn idempotency_key(payload: &ReportPayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.name.as_bytes());
    hasher.update(b"\n");
    // BTreeMap iterates in key order
    for (key, url) in &payload.thumbnails {
        hasher.update(format!("{key}={url}\n").as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// POSTs the payload as JSON to a callback URL
pub struct WebhookReporter {
    http_client: Client,
    url: String,
    token: Option<String>,
    retry: RetryConfig,
}

impl WebhookReporter {
    pub fn new(
        url: &str,
        token: Option<String>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> std::result::Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.to_string(),
            token,
            retry,
        })
    }
}

#[async_trait]
impl MetadataReporter for WebhookReporter {
    async fn report(&self, payload: &ReportPayload) -> Result<()> {
        let key = idempotency_key(payload);
        let mut attempt = 0;
        let mut backoff = self.retry.initial_backoff;

        loop {
            let mut request = self
                .http_client
                .post(&self.url)
                .header("Idempotency-Key", &key)
                .json(payload);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(name = %payload.name, attempt, "Metadata callback accepted");
                    return Ok(());
                }
                Ok(response) if response.status().is_client_error() => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ThumbnailError::Report(format!(
                        "callback rejected with {status}: {body}"
                    )));
                }
                Ok(response) => format!("callback returned {}", response.status()),
                Err(e) => e.to_string(),
            };

            attempt += 1;
            if attempt > self.retry.max_retries {
                return Err(ThumbnailError::Report(format!(
                    "giving up after {attempt} attempts: {failure}"
                )));
            }

            warn!(
                name = %payload.name,
                attempt,
                max_retries = self.retry.max_retries,
                delay_ms = backoff.as_millis() as u64,
                error = %failure,
                "Metadata callback failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.retry.max_backoff);
        }
    }
}
