//! Thumbnail Service - Main entry point
//!
//! Receives `google.cloud.storage.object.v1.finalized` CloudEvents over HTTP
//! (Eventarc / Cloud Run) and publishes thumbnails next to the uploaded object.

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;
use thumbnail_service::handlers::{self, EventState};
use thumbnail_service::models::TARGET_SIZES;
use thumbnail_service::services::raster::{
    Adapters, DocxAdapter, DocxHtmlConverter, GotenbergRenderer, ImageAdapter, PdfAdapter,
    PdfiumRasterizer,
};
use thumbnail_service::services::reporter::{
    LogReporter, MetadataReporter, RetryConfig, WebhookReporter,
};
use thumbnail_service::services::storage::{GcsAuth, GcsClient, ObjectStore};
use thumbnail_service::services::thumbnail::{
    ThumbnailConfig, ThumbnailProcessor, ThumbnailService, ThumbnailServiceConfig,
};
use thumbnail_service::Config;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Event bodies are object resources, never file content
const MAX_EVENT_BODY_BYTES: usize = 1024 * 1024;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "thumbnail_service=info,actix_web=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // rustls 0.23 needs a process-wide crypto provider
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    info!(
        "Starting thumbnail-service v{} (size_concurrency={}, timeout={}s)",
        env!("CARGO_PKG_VERSION"),
        config.size_concurrency(),
        config.thumb_invocation_timeout_secs
    );

    // Object store
    let auth = if config.gcs_anonymous {
        warn!("GCS_ANONYMOUS is set, requests are sent without credentials");
        GcsAuth::Anonymous
    } else {
        GcsAuth::Adc
    };
    let store: Arc<dyn ObjectStore> = Arc::new(GcsClient::new(
        &config.gcs_api_base,
        &config.gcs_host,
        auth,
        config.http_timeout(),
    )?);

    // Rasterizer adapters
    let rasterizer = PdfiumRasterizer::new(config.pdfium_library_path.as_deref());
    if !rasterizer.is_available() {
        warn!("pdfium unavailable, PDF and DOCX uploads will fail to rasterize");
    }
    let pdf = PdfAdapter::new(Arc::new(rasterizer));
    let renderer = GotenbergRenderer::new(&config.gotenberg_url, config.http_timeout())?;
    let adapters = Adapters {
        image: ImageAdapter::new(),
        docx: DocxAdapter::new(
            Arc::new(DocxHtmlConverter::new()),
            Arc::new(renderer),
            pdf.clone(),
        ),
        pdf,
    };

    // Metadata reporter
    let reporter: Arc<dyn MetadataReporter> = match &config.metadata_callback_url {
        Some(url) => {
            info!(url = %url, "Reporting thumbnails to metadata callback");
            Arc::new(WebhookReporter::new(
                url,
                config.metadata_callback_token.clone(),
                RetryConfig {
                    max_retries: config.metadata_callback_max_retries,
                    ..Default::default()
                },
                config.http_timeout(),
            )?)
        }
        None => {
            info!("METADATA_CALLBACK_URL not set, thumbnails are only logged");
            Arc::new(LogReporter)
        }
    };

    let processor = ThumbnailProcessor::new(ThumbnailConfig {
        jpeg_quality: config.thumb_jpeg_quality,
    });
    let service = Arc::new(ThumbnailService::new(
        store,
        adapters,
        processor,
        reporter,
        ThumbnailServiceConfig {
            size_concurrency: config.size_concurrency(),
            targets: TARGET_SIZES.to_vec(),
        },
    ));

    let state = web::Data::new(EventState {
        service,
        invocation_timeout: config.invocation_timeout(),
    });

    let bind_address = (config.host.clone(), config.port);
    info!("HTTP server listening on {}:{}", bind_address.0, bind_address.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(MAX_EVENT_BODY_BYTES))
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(bind_address)?
    .run()
    .await?;

    info!("Thumbnail service shut down");
    Ok(())
}
