//! Job outcomes and the coordinator status wire format.

use serde::{Deserialize, Serialize};

use crate::work_item::WorkItemId;

/// Terminal local outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobOutcome {
    /// Every step completed
    Finished,
    /// A step failed
    Failed,
    /// The media kind cannot be processed
    InvalidFile,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Finished => "finished",
            JobOutcome::Failed => "failed",
            JobOutcome::InvalidFile => "invalid-file",
        }
    }

    /// Status to send to the coordinator, if this outcome has a wire form.
    ///
    /// The coordinator has no "failed" status, so plain failures map to `None`.
    pub fn coordinator_status(&self) -> Option<CoordinatorStatus> {
        match self {
            JobOutcome::Finished => Some(CoordinatorStatus::Finished),
            JobOutcome::InvalidFile => Some(CoordinatorStatus::InvalidFile),
            JobOutcome::Failed => None,
        }
    }
}

/// File status values accepted by the coordinator's mark-file endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinatorStatus {
    Pending,
    Finished,
    InvalidFile,
}

/// Body of `POST /coordinator/v1/mark-file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkFileRequest {
    pub file_id: WorkItemId,
    /// `None` serializes as JSON `null`
    pub status: Option<CoordinatorStatus>,
}
