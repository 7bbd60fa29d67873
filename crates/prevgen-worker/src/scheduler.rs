//! Batch scheduling of work items.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info};

use prevgen_models::{JobOutcome, WorkItem};

use crate::pipeline::JobRunner;

/// Tally of one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batches: usize,
    pub finished: usize,
    pub failed: usize,
    pub invalid: usize,
    /// Jobs that panicked (also counted as failed)
    pub panicked: usize,
}

impl BatchReport {
    pub fn jobs(&self) -> usize {
        self.finished + self.failed + self.invalid
    }

    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Finished => self.finished += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::InvalidFile => self.invalid += 1,
        }
    }
}

/// Runs work items in contiguous batches.
///
/// Jobs within a batch run concurrently; batch k+1 starts only after every
/// job of batch k has settled.
pub struct BatchScheduler {
    runner: Arc<dyn JobRunner>,
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(runner: Arc<dyn JobRunner>, batch_size: usize) -> Self {
        Self {
            runner,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn run(&self, items: Vec<WorkItem>) -> BatchReport {
        let mut report = BatchReport::default();
        if items.is_empty() {
            return report;
        }

        info!(
            items = items.len(),
            batch_size = self.batch_size,
            "Scheduling work items"
        );

        for (index, batch) in items.chunks(self.batch_size).enumerate() {
            debug!(batch = index, jobs = batch.len(), "Starting batch");

            let jobs = batch.iter().cloned().map(|item| {
                let runner = Arc::clone(&self.runner);
                let id = item.id.clone();
                async move {
                    let result = AssertUnwindSafe(runner.run_job(item)).catch_unwind().await;
                    (id, result)
                }
            });

            for (id, result) in join_all(jobs).await {
                match result {
                    Ok(outcome) => report.record(outcome),
                    Err(panic) => {
                        error!(
                            work_item_id = %id,
                            panic = %panic_message(&*panic),
                            "Job panicked"
                        );
                        report.panicked += 1;
                        report.record(JobOutcome::Failed);
                    }
                }
            }
            report.batches += 1;
        }

        info!(
            finished = report.finished,
            failed = report.failed,
            invalid = report.invalid,
            "Batches settled"
        );
        report
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
