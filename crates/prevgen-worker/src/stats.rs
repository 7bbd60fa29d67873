//! Per-worker counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use prevgen_models::JobOutcome;

/// Counters owned by one worker instance.
#[derive(Debug, Default)]
pub struct WorkerStats {
    running: AtomicBool,
    total: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
    invalid: AtomicU64,
    uploads: AtomicU64,
}

/// Serializable snapshot of [`WorkerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub running: bool,
    /// One per uploaded tier plus one per finished job
    pub total: u64,
    pub finished: u64,
    pub failed: u64,
    pub invalid: u64,
    pub uploads: u64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Finished => {
                self.finished.fetch_add(1, Ordering::Relaxed);
                self.total.fetch_add(1, Ordering::Relaxed);
            }
            JobOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            JobOutcome::InvalidFile => {
                self.invalid.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.running.load(Ordering::SeqCst),
            total: self.total.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_counts_uploads_and_finished_jobs() {
        let stats = WorkerStats::new();
        stats.record_upload();
        stats.record_upload();
        stats.record_outcome(JobOutcome::Finished);
        stats.record_outcome(JobOutcome::Failed);
        stats.record_outcome(JobOutcome::InvalidFile);

        let status = stats.status();
        assert_eq!(status.total, 3);
        assert_eq!(status.uploads, 2);
        assert_eq!((status.finished, status.failed, status.invalid), (1, 1, 1));
        assert!(!status.running);
    }

    #[test]
    fn test_status_serializes() {
        let stats = WorkerStats::new();
        stats.set_running(true);
        let value = serde_json::to_value(stats.status()).unwrap();
        assert_eq!(value["running"], true);
        assert_eq!(value["total"], 0);
    }
}
