//! Preview derivative worker.
//!
//! This crate provides:
//! - The polling [`WorkerLoop`] and its [`BatchScheduler`]
//! - The per-item [`JobPipeline`] (download, thumbnail, metadata, tiers)
//! - Temporary file tracking with exactly-once deletion
//! - Environment configuration, structured job logging and metrics

pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod schedule;
pub mod scheduler;
pub mod stats;
pub mod tracker;
pub mod worker_loop;

pub use config::WorkerConfig;
pub use error::{ErrorKind, WorkerError, WorkerResult};
pub use fs::{Filesystem, TokioFilesystem};
pub use logging::JobLogger;
pub use pipeline::{JobPipeline, JobRunner, PipelineConfig};
pub use schedule::{PollMode, PollSchedule};
pub use scheduler::{BatchReport, BatchScheduler};
pub use stats::{WorkerStats, WorkerStatus};
pub use tracker::{JobScope, ResourceTracker};
pub use worker_loop::{LoopSettings, WorkerLoop};
