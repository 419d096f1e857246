use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static SAVES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "entry_store_saves_total",
        "Save requests by action and outcome",
        &["action", "outcome"]
    )
    .expect("register saves_total")
});

pub static SAVE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "entry_store_save_duration_seconds",
        "Duration of save requests including both store round trips",
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("register save_duration")
});

pub fn record_save(action: &str, outcome: &str) {
    SAVES_TOTAL.with_label_values(&[action, outcome]).inc();
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}
