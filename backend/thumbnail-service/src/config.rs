//! Configuration for Thumbnail service
use serde::Deserialize;
use std::time::Duration;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port (Cloud Run injects PORT)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host used in public thumbnail URLs
    #[serde(default = "default_gcs_host")]
    pub gcs_host: String,

    /// GCS JSON API origin; point at an emulator for local runs
    #[serde(default = "default_gcs_api_base")]
    pub gcs_api_base: String,

    /// Skip ADC tokens (emulators only)
    #[serde(default)]
    pub gcs_anonymous: bool,

    /// Directory holding the pdfium shared library
    #[serde(default)]
    pub pdfium_library_path: Option<String>,

    /// Gotenberg base URL for HTML to PDF printing
    #[serde(default = "default_gotenberg_url")]
    pub gotenberg_url: String,

    /// Metadata callback; thumbnails are only logged when unset
    #[serde(default)]
    pub metadata_callback_url: Option<String>,

    /// Bearer token sent to the metadata callback
    #[serde(default)]
    pub metadata_callback_token: Option<String>,

    #[serde(default = "default_callback_max_retries")]
    pub metadata_callback_max_retries: u32,

    /// Sizes processed concurrently within one invocation
    #[serde(default = "default_size_concurrency")]
    pub thumb_size_concurrency: usize,

    /// Overall budget for one invocation
    #[serde(default = "default_invocation_timeout_secs")]
    pub thumb_invocation_timeout_secs: u64,

    /// JPEG quality (0-100)
    #[serde(default = "default_jpeg_quality")]
    pub thumb_jpeg_quality: u8,

    /// Timeout for outbound HTTP calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_gcs_host() -> String {
    "storage.googleapis.com".to_string()
}

fn default_gcs_api_base() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_gotenberg_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_callback_max_retries() -> u32 {
    3
}

fn default_size_concurrency() -> usize {
    2
}

fn default_invocation_timeout_secs() -> u64 {
    540 // Cloud Functions gen2 event limit
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_http_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.thumb_invocation_timeout_secs)
    }

    /// Concurrency of at least one
    pub fn size_concurrency(&self) -> usize {
        self.thumb_size_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.gcs_host, "storage.googleapis.com");
        assert_eq!(config.gcs_api_base, "https://storage.googleapis.com");
        assert!(!config.gcs_anonymous);
        assert!(config.pdfium_library_path.is_none());
        assert!(config.metadata_callback_url.is_none());
        assert_eq!(config.metadata_callback_max_retries, 3);
        assert_eq!(config.size_concurrency(), 2);
        assert_eq!(config.invocation_timeout(), Duration::from_secs(540));
        assert_eq!(config.thumb_jpeg_quality, 85);
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "9000"),
            ("GCS_ANONYMOUS", "true"),
            ("METADATA_CALLBACK_URL", "https://api.internal/thumbnails"),
            ("THUMB_SIZE_CONCURRENCY", "0"),
        ]);
        assert_eq!(config.port, 9000);
        assert!(config.gcs_anonymous);
        assert_eq!(
            config.metadata_callback_url.as_deref(),
            Some("https://api.internal/thumbnails")
        );
        assert_eq!(config.size_concurrency(), 1);
    }
}
