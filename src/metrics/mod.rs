//! Metrics module
//!
//! Provides Prometheus metrics for chunk attempts and upload sessions.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    // Chunk metrics
    pub static ref CHUNK_ATTEMPTS_TOTAL: CounterVec = register_counter_vec!(
        "chunkr_chunk_attempts_total",
        "Chunk transfer attempts by result",
        &["result"]  // "success" or "error"
    ).unwrap();

    pub static ref CHUNK_RETRIES_TOTAL: Counter = register_counter!(
        "chunkr_chunk_retries_total",
        "Chunk attempts re-issued after an error"
    ).unwrap();

    pub static ref CHUNK_FAILURES_TOTAL: Counter = register_counter!(
        "chunkr_chunk_failures_total",
        "Chunks that exhausted their attempt budget"
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "chunkr_upload_bytes_total",
        "Bytes in chunks accepted by the endpoint"
    ).unwrap();

    // Session metrics
    pub static ref UPLOAD_SESSIONS_TOTAL: CounterVec = register_counter_vec!(
        "chunkr_upload_sessions_total",
        "Settled upload sessions by outcome",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "chunkr_upload_duration_seconds",
        "Time from start to settled outcome",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    ).unwrap();
}

/// Record the result of one chunk attempt
pub fn record_attempt(result: &str) {
    CHUNK_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
}

/// Record a retried attempt
pub fn record_retry() {
    CHUNK_RETRIES_TOTAL.inc();
}

/// Record a chunk that failed permanently
pub fn record_chunk_failure() {
    CHUNK_FAILURES_TOTAL.inc();
}

/// Record bytes of an accepted chunk
pub fn record_chunk_bytes(bytes: u64) {
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a settled session
pub fn record_session(status: &str, duration_secs: f64) {
    UPLOAD_SESSIONS_TOTAL.with_label_values(&[status]).inc();
    UPLOAD_DURATION.observe(duration_secs);
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
