//! Client metrics.
//!
//! Request counters by endpoint and status, and a latency histogram per
//! endpoint. Download byte totals are tracked separately.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total outbound requests by endpoint and status.
    pub const REQUESTS_TOTAL: &str = "prevgen_client_requests_total";

    /// Request latency in seconds by endpoint.
    pub const LATENCY_SECONDS: &str = "prevgen_client_latency_seconds";

    /// Bytes written to disk by source downloads.
    pub const DOWNLOAD_BYTES_TOTAL: &str = "prevgen_client_download_bytes_total";
}

/// Record metrics for a completed request.
///
/// `status` is the HTTP status, or 0 when no response was received.
pub fn record_request(endpoint: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "endpoint" => endpoint.to_string()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_download_bytes(bytes: u64) {
    counter!(names::DOWNLOAD_BYTES_TOTAL).increment(bytes);
}
