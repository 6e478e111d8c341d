//! Thumbnail service - drives one upload event through the pipeline
//!
//! This service handles the complete thumbnail generation workflow:
//! 1. Classify the object name (skip our own thumbnails, ignore unknown formats)
//! 2. Download the source from GCS
//! 3. Decode it to one raster image with the matching adapter
//! 4. Resize, encode and publish every size the source covers
//! 5. Report the published URLs
//!
//! Failures never escape `handle`; they are logged and summarised in the
//! returned [`InvocationOutcome`].

use super::processor::{plan, ThumbnailProcessor};
use crate::error::Result;
use crate::metrics;
use crate::models::{
    FailedStage, InvocationOutcome, ReportPayload, SourceObject, TargetSize, ThumbnailIndex,
    TARGET_SIZES,
};
use crate::services::classifier::{classify, Classification, ConversionPath};
use crate::services::publisher::Publisher;
use crate::services::raster::{output_format, Adapters, RasterImage};
use crate::services::reporter::MetadataReporter;
use crate::services::storage::ObjectStore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Thumbnail service configuration
#[derive(Clone, Debug)]
pub struct ThumbnailServiceConfig {
    /// Sizes resized and published at the same time
    pub size_concurrency: usize,
    /// Target boxes, in generation order
    pub targets: Vec<TargetSize>,
}

impl Default for ThumbnailServiceConfig {
    fn default() -> Self {
        Self {
            size_concurrency: 2,
            targets: TARGET_SIZES.to_vec(),
        }
    }
}

/// Thumbnail service for generating and publishing thumbnails
pub struct ThumbnailService {
    store: Arc<dyn ObjectStore>,
    adapters: Adapters,
    processor: Arc<ThumbnailProcessor>,
    publisher: Publisher,
    reporter: Arc<dyn MetadataReporter>,
    config: ThumbnailServiceConfig,
}

impl ThumbnailService {
    /// Create a new thumbnail service
    pub fn new(
        store: Arc<dyn ObjectStore>,
        adapters: Adapters,
        processor: ThumbnailProcessor,
        reporter: Arc<dyn MetadataReporter>,
        config: ThumbnailServiceConfig,
    ) -> Self {
        info!(
            size_concurrency = config.size_concurrency,
            sizes = config.targets.len(),
            "Thumbnail service initialized"
        );

        Self {
            publisher: Publisher::new(store.clone()),
            store,
            adapters,
            processor: Arc::new(processor),
            reporter,
            config,
        }
    }

    /// Handle one finalized upload
    pub async fn handle(&self, source: SourceObject) -> InvocationOutcome {
        let outcome = self.process(source).await;
        metrics::record_invocation(outcome.label());
        outcome
    }

    async fn process(&self, source: SourceObject) -> InvocationOutcome {
        let path = match classify(&source.name) {
            Classification::Skip => {
                debug!(bucket = %source.bucket, name = %source.name, "Skipping generated thumbnail");
                return InvocationOutcome::Skipped;
            }
            Classification::Unsupported { extension } => {
                info!(
                    bucket = %source.bucket,
                    name = %source.name,
                    extension = %extension,
                    "Unsupported file type, ignoring"
                );
                return InvocationOutcome::Unsupported { extension };
            }
            Classification::Convert(path) => path,
        };

        info!(
            bucket = %source.bucket,
            name = %source.name,
            path = path.as_str(),
            "Generating thumbnails"
        );

        let data = match self.store.download(&source.bucket, &source.name).await {
            Ok(data) => data,
            Err(e) => {
                error!(uri = %source.uri(), error = %e, "Failed to download source");
                return InvocationOutcome::Failed {
                    stage: FailedStage::Download,
                    error: e.to_string(),
                };
            }
        };

        let started = Instant::now();
        let raster = match self.adapters.decode(path, &source, data).await {
            Ok(raster) => raster,
            Err(e) => {
                error!(
                    uri = %source.uri(),
                    path = path.as_str(),
                    kind = e.kind(),
                    error = %e,
                    "Failed to decode source"
                );
                return InvocationOutcome::Failed {
                    stage: FailedStage::Decode,
                    error: e.to_string(),
                };
            }
        };
        metrics::observe_stage("decode", started.elapsed());

        let (width, height) = (raster.width(), raster.height());
        debug!(uri = %source.uri(), width, height, "Source decoded");

        let sizes = plan(width, height, &self.config.targets);
        for target in &self.config.targets {
            if !sizes.contains(target) {
                info!(
                    uri = %source.uri(),
                    size = target.label,
                    width,
                    height,
                    "Source smaller than target, skipping size"
                );
            }
        }
        let skipped = self.config.targets.len() - sizes.len();

        let started = Instant::now();
        let results = self
            .generate_and_publish(Arc::new(raster), Arc::new(source.clone()), path, sizes)
            .await;
        metrics::observe_stage("generate", started.elapsed());

        let mut index = ThumbnailIndex::new();
        let mut failed = 0;
        for (label, result) in results {
            match result {
                Ok(url) => index.insert(label, url),
                Err(e) => {
                    failed += 1;
                    warn!(
                        uri = %source.uri(),
                        size = label,
                        kind = e.kind(),
                        error = %e,
                        "Failed to produce thumbnail size"
                    );
                }
            }
        }

        metrics::record_variants("published", index.len());
        metrics::record_variants("skipped", skipped);
        metrics::record_variants("failed", failed);

        let started = Instant::now();
        let payload = ReportPayload::new(source.name.clone(), &index);
        if let Err(e) = self.reporter.report(&payload).await {
            error!(uri = %source.uri(), error = %e, "Failed to report thumbnails");
        }
        metrics::observe_stage("report", started.elapsed());

        info!(
            uri = %source.uri(),
            published = index.len(),
            skipped,
            failed,
            "Thumbnails generated"
        );

        InvocationOutcome::Completed {
            index,
            skipped,
            failed,
        }
    }

    /// Resize, encode and publish each size with bounded parallelism.
    ///
    /// A failing size never cancels its siblings.
    async fn generate_and_publish(
        &self,
        raster: Arc<RasterImage>,
        source: Arc<SourceObject>,
        path: ConversionPath,
        sizes: Vec<TargetSize>,
    ) -> Vec<(&'static str, Result<String>)> {
        let format = output_format(path, &source);
        let publisher = &self.publisher;

        stream::iter(sizes)
            .map(|target| {
                let processor = self.processor.clone();
                let raster = raster.clone();
                let source = source.clone();
                let format = format.clone();
                async move {
                    let bucket = source.bucket.clone();
                    let result = async {
                        let variant = processor
                            .render_async(raster, target, source, format)
                            .await?;
                        publisher.publish(&bucket, &variant).await
                    }
                    .await;
                    (target.label, result)
                }
            })
            .buffer_unordered(self.config.size_concurrency.max(1))
            .collect()
            .await
    }
}
