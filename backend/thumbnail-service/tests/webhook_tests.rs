use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thumbnail_service::models::ReportPayload;
use thumbnail_service::services::reporter::{
    idempotency_key, MetadataReporter, RetryConfig, WebhookReporter,
};

#[derive(Clone)]
struct Callback {
    /// Requests answered with `failure_status` before succeeding
    fail_first: usize,
    failure_status: u16,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(Option<String>, Option<String>, ReportPayload)>>>,
}

async fn callback(
    req: HttpRequest,
    body: web::Json<ReportPayload>,
    state: web::Data<Callback>,
) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.seen.lock().unwrap().push((
        header("idempotency-key"),
        header("authorization"),
        body.into_inner(),
    ));

    let hit = state.hits.fetch_add(1, Ordering::SeqCst);
    if hit < state.fail_first {
        return HttpResponse::build(
            actix_web::http::StatusCode::from_u16(state.failure_status).unwrap(),
        )
        .finish();
    }
    HttpResponse::NoContent().finish()
}

/// Start a callback server on an ephemeral port and return its URL.
fn start_callback(state: Callback) -> (String, actix_web::dev::ServerHandle) {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/thumbnails", web::post().to(callback))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    (format!("http://{addr}/thumbnails"), handle)
}

fn payload() -> ReportPayload {
    let mut thumbnails = BTreeMap::new();
    thumbnails.insert(
        "s150x150".to_string(),
        "https://storage.googleapis.com/media/photo_150x150_u_thumbnail.jpg".to_string(),
    );
    ReportPayload {
        name: "photo.jpg".to_string(),
        thumbnails,
    }
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
    }
}

#[actix_web::test]
async fn test_retries_server_errors_with_same_key() {
    let state = Callback {
        fail_first: 2,
        failure_status: 503,
        hits: Arc::new(AtomicUsize::new(0)),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let (url, handle) = start_callback(state.clone());

    let reporter = WebhookReporter::new(
        &url,
        Some("secret".to_string()),
        fast_retry(3),
        Duration::from_secs(5),
    )
    .unwrap();
    reporter.report(&payload()).await.unwrap();

    assert_eq!(state.hits.load(Ordering::SeqCst), 3);
    let seen = state.seen.lock().unwrap();
    let expected_key = idempotency_key(&payload());
    for (key, auth, body) in seen.iter() {
        assert_eq!(key.as_deref(), Some(expected_key.as_str()));
        assert_eq!(auth.as_deref(), Some("Bearer secret"));
        assert_eq!(body, &payload());
    }
    drop(seen);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_client_errors_are_not_retried() {
    let state = Callback {
        fail_first: usize::MAX,
        failure_status: 422,
        hits: Arc::new(AtomicUsize::new(0)),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let (url, handle) = start_callback(state.clone());

    let reporter = WebhookReporter::new(&url, None, fast_retry(3), Duration::from_secs(5)).unwrap();
    let err = reporter.report(&payload()).await.unwrap_err();

    assert!(err.to_string().contains("422"));
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
    assert_eq!(state.seen.lock().unwrap()[0].1, None);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_gives_up_after_max_retries() {
    let state = Callback {
        fail_first: usize::MAX,
        failure_status: 500,
        hits: Arc::new(AtomicUsize::new(0)),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let (url, handle) = start_callback(state.clone());

    let reporter = WebhookReporter::new(&url, None, fast_retry(2), Duration::from_secs(5)).unwrap();
    let err = reporter.report(&payload()).await.unwrap_err();

    assert!(err.to_string().contains("giving up after 3 attempts"));
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);

    handle.stop(true).await;
}
