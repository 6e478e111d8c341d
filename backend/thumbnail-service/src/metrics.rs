use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};

static INVOCATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "thumbnail_invocations_total",
            "Upload events handled, by terminal outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create thumbnail_invocations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register thumbnail_invocations_total");
    counter
});

static VARIANTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "thumbnail_variants_total",
            "Thumbnail sizes by result (published, skipped, failed)",
        ),
        &["result"],
    )
    .expect("failed to create thumbnail_variants_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register thumbnail_variants_total");
    counter
});

static STAGE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "thumbnail_stage_duration_seconds",
            "Time spent per pipeline stage",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["stage"],
    )
    .expect("failed to create thumbnail_stage_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register thumbnail_stage_duration_seconds");
    histogram
});

pub fn record_invocation(outcome: &str) {
    INVOCATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_variants(result: &str, count: usize) {
    VARIANTS_TOTAL
        .with_label_values(&[result])
        .inc_by(count as u64);
}

pub fn observe_stage(stage: &str, elapsed: Duration) {
    STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(elapsed.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_gathered() {
        record_invocation("completed");
        record_variants("published", 3);
        observe_stage("decode", Duration::from_millis(12));

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.contains(&"thumbnail_invocations_total".to_string()));
        assert!(names.contains(&"thumbnail_variants_total".to_string()));
        assert!(names.contains(&"thumbnail_stage_duration_seconds".to_string()));
    }
}
