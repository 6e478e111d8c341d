//! CloudEvent receiver for `google.cloud.storage.object.v1.finalized`
//!
//! Accepts binary mode (`ce-*` headers, object resource as the JSON body) and
//! structured mode (`application/cloudevents+json`, object resource under
//! `data`). Only `bucket` and `name` are read.

use crate::error::AppError;
use crate::models::SourceObject;
use crate::services::ThumbnailService;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const FINALIZED_EVENT_TYPE: &str = "google.cloud.storage.object.v1.finalized";

const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Shared state of the event endpoint
pub struct EventState {
    pub service: Arc<ThumbnailService>,
    pub invocation_timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct StorageObjectData {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredEvent {
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Option<StorageObjectData>,
}

/// Event type, id and object fields extracted from either delivery mode
fn parse_delivery(
    req: &HttpRequest,
    body: &[u8],
) -> Result<(Option<String>, Option<String>, StorageObjectData), AppError> {
    let content_type = req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with(STRUCTURED_CONTENT_TYPE) {
        let event: StructuredEvent = serde_json::from_slice(body)?;
        return Ok((event.event_type, event.id, event.data.unwrap_or_default()));
    }

    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let data: StorageObjectData = serde_json::from_slice(body)?;
    Ok((header("ce-type"), header("ce-id"), data))
}

/// POST /
pub async fn receive_event(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<EventState>,
) -> Result<HttpResponse, AppError> {
    let (event_type, event_id, data) = parse_delivery(&req, &body)?;

    if let Some(event_type) = event_type.as_deref() {
        if event_type != FINALIZED_EVENT_TYPE {
            debug!(event_type = %event_type, "Ignoring non-finalize event");
            return Ok(HttpResponse::NoContent().finish());
        }
    }

    let (bucket, name) = match (data.bucket, data.name) {
        (Some(bucket), Some(name)) if !bucket.is_empty() && !name.is_empty() => (bucket, name),
        _ => {
            return Err(AppError::BadRequest(
                "event data must include bucket and name".to_string(),
            ))
        }
    };

    let source = SourceObject::new(bucket, name);
    info!(
        event_id = event_id.as_deref().unwrap_or("-"),
        uri = %source.uri(),
        "Received upload event"
    );

    let uri = source.uri();
    match tokio::time::timeout(state.invocation_timeout, state.service.handle(source)).await {
        Ok(outcome) => debug!(uri = %uri, outcome = outcome.label(), "Event handled"),
        Err(_) => {
            crate::metrics::record_invocation("timeout");
            warn!(
                uri = %uri,
                timeout_secs = state.invocation_timeout.as_secs(),
                "Invocation timed out; published thumbnails are kept"
            );
        }
    }

    Ok(HttpResponse::NoContent().finish())
}
