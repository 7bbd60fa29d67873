//! Shared data models for the preview derivative worker.
//!
//! This crate provides Serde-serializable types for:
//! - Work items fetched from the coordinator and the shards that host them
//! - Media kinds and the resolution ladder of quality tiers
//! - Job outcomes and the coordinator status wire format
//! - Local file pointers tracked while a job runs

pub mod api;
pub mod file_ptr;
pub mod media_kind;
pub mod outcome;
pub mod tier;
pub mod work_item;

// Re-export common types
pub use api::ApiEnvelope;
pub use file_ptr::{ExtractedMetadata, LocalFilePointer};
pub use media_kind::MediaKind;
pub use outcome::{CoordinatorStatus, JobOutcome, MarkFileRequest};
pub use tier::{QualityTier, ResolutionLadder};
pub use work_item::{StorageShard, WorkItem, WorkItemId};
