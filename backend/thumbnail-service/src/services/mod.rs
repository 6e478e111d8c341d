pub mod classifier;
pub mod publisher;
pub mod raster;
pub mod reporter;
pub mod storage;
pub mod thumbnail;

pub use classifier::{classify, Classification, ConversionPath};
pub use publisher::Publisher;
pub use reporter::{LogReporter, MetadataReporter, RetryConfig, WebhookReporter};
pub use storage::{GcsAuth, GcsClient, InMemoryStore, ObjectStore, UploadOptions};
pub use thumbnail::{ThumbnailService, ThumbnailServiceConfig};
