use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};
use std::time::Instant;
use tracing::trace;

lazy_static! {
    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounter = register_int_counter!(
        "http_requests_total",
        "Total number of HTTP requests"
    ).unwrap();

    pub static ref HTTP_REQUESTS_SUCCESS: IntCounter = register_int_counter!(
        "http_requests_success_total",
        "Total number of successful HTTP requests"
    ).unwrap();

    pub static ref HTTP_REQUESTS_ERROR: IntCounter = register_int_counter!(
        "http_requests_error_total",
        "Total number of failed HTTP requests"
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION: Histogram = register_histogram!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds"
    ).unwrap();

    // Business metrics
    pub static ref CHAT_REQUESTS: IntCounter = register_int_counter!(
        "chat_requests_total",
        "Total number of chat requests handled"
    ).unwrap();

    pub static ref CHAT_FALLBACKS: IntCounter = register_int_counter!(
        "chat_fallbacks_total",
        "Total number of chat replies that fell back to the safe default"
    ).unwrap();

    pub static ref INDEX_REBUILDS: IntCounter = register_int_counter!(
        "index_rebuilds_total",
        "Total number of catalog/FAQ index rebuilds"
    ).unwrap();

    pub static ref SNAPSHOT_RESTORES: IntCounter = register_int_counter!(
        "snapshot_restores_total",
        "Total number of index loads served from the local snapshot"
    ).unwrap();

    pub static ref ORDER_LOOKUPS: IntCounter = register_int_counter!(
        "order_lookups_total",
        "Total number of order lookups attempted"
    ).unwrap();

    pub static ref ORDER_EMAIL_MISMATCHES: IntCounter = register_int_counter!(
        "order_email_mismatches_total",
        "Total number of order lookups refused on email mismatch"
    ).unwrap();

    pub static ref CONVERSATIONS_PERSISTED: IntCounter = register_int_counter!(
        "conversations_persisted_total",
        "Total number of conversation upserts"
    ).unwrap();
}

/// Record HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, started: Instant) {
    HTTP_REQUESTS_TOTAL.inc();

    trace!(
        http.method = method,
        http.path = path,
        http.status = status,
        latency_secs = started.elapsed().as_secs_f64(),
        "recording HTTP request metrics"
    );

    if status < 400 {
        HTTP_REQUESTS_SUCCESS.inc();
    } else {
        HTTP_REQUESTS_ERROR.inc();
    }

    HTTP_REQUEST_DURATION.observe(started.elapsed().as_secs_f64());
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
