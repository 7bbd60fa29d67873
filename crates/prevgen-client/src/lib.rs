//! HTTP collaborators for the preview derivative worker.
//!
//! This crate provides:
//! - [`CoordinatorClient`]: work-list fetch and file status reporting
//! - [`ShardClientFactory`]: per-shard multipart upload channels
//! - [`HttpDownloader`]: streamed source downloads
//!
//! Each client sits behind an `async_trait` seam so the job pipeline can be
//! driven by fakes in tests.

pub mod config;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod metrics;
pub mod shard;

pub use config::ClientConfig;
pub use coordinator::{CoordinatorApi, CoordinatorClient, FIND_WORK_PATH, MARK_FILE_PATH};
pub use download::{HttpDownloader, SourceDownloader};
pub use error::{ClientError, ClientResult};
pub use shard::{
    preview_file_name, thumbnail_file_name, HttpShardChannel, ShardChannel, ShardClientFactory,
    ShardGateway, METADATA_PATCH_PATH, PREVIEW_CREATE_PATH,
};
