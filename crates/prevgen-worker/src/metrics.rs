//! Worker metrics.
//!
//! Counters for loop cycles, job outcomes, uploaded derivatives and cleanup
//! failures, plus a job duration histogram.

use metrics::{counter, gauge, histogram};

use prevgen_models::{JobOutcome, QualityTier};

/// Metric name constants for consistency.
pub mod names {
    /// Loop cycles by result (ok, failed, panicked).
    pub const CYCLES_TOTAL: &str = "prevgen_worker_cycles_total";

    /// Finished pipeline runs by outcome.
    pub const JOBS_TOTAL: &str = "prevgen_worker_jobs_total";

    /// Uploaded scaled derivatives by tier.
    pub const UPLOADS_TOTAL: &str = "prevgen_worker_uploads_total";

    /// Temporary files that could not be deleted.
    pub const CLEANUP_FAILURES_TOTAL: &str = "prevgen_worker_cleanup_failures_total";

    /// Pipeline run duration in seconds by outcome.
    pub const JOB_DURATION_SECONDS: &str = "prevgen_worker_job_duration_seconds";

    /// Temporary files currently tracked.
    pub const TRACKED_FILES: &str = "prevgen_worker_tracked_files";
}

pub fn record_cycle(result: &'static str) {
    counter!(names::CYCLES_TOTAL, "result" => result).increment(1);
}

/// Record a finished pipeline run.
pub fn record_job(outcome: JobOutcome, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome.as_str()).record(duration_secs);
}

pub fn record_upload(tier: QualityTier) {
    counter!(names::UPLOADS_TOTAL, "tier" => tier.label()).increment(1);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}

pub fn set_tracked_files(count: usize) {
    gauge!(names::TRACKED_FILES).set(count as f64);
}
