use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "thumbnail-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// The service holds no connections; ready once it is listening.
pub async fn readiness() -> HttpResponse {
    HttpResponse::Ok().finish()
}
