//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for pipeline runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use prevgen_models::WorkItem;

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the work item ID, its storage key and the operation.
#[derive(Debug, Clone)]
pub struct JobLogger {
    work_item_id: String,
    file_key: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a work item and operation.
    pub fn new(item: &WorkItem, operation: &str) -> Self {
        Self {
            work_item_id: item.id.to_string(),
            file_key: item.file_key.clone().unwrap_or_default(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            work_item_id = %self.work_item_id,
            file_key = %self.file_key,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, message: &str) {
        info!(
            work_item_id = %self.work_item_id,
            file_key = %self.file_key,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(
            work_item_id = %self.work_item_id,
            file_key = %self.file_key,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(
            work_item_id = %self.work_item_id,
            file_key = %self.file_key,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job operation.
    pub fn log_completion(&self, message: &str) {
        info!(
            work_item_id = %self.work_item_id,
            file_key = %self.file_key,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn work_item_id(&self) -> &str {
        &self.work_item_id
    }

    pub fn file_key(&self) -> &str {
        &self.file_key
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            work_item_id = %self.work_item_id,
            file_key = %self.file_key,
            operation = %self.operation
        )
    }
}
