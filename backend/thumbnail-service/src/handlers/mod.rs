/// HTTP handlers for the thumbnail service
///
/// This module contains handlers for:
/// - Events: CloudEvent deliveries for finalized uploads
/// - Health: liveness and readiness probes
pub mod events;
pub mod health;

pub use events::{receive_event, EventState, FINALIZED_EVENT_TYPE};
pub use health::{health, liveness, readiness};

use actix_web::web;

/// Register every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::post().to(receive_event))
        .route("/health", web::get().to(health))
        .route("/health/live", web::get().to(liveness))
        .route("/health/ready", web::get().to(readiness))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
