//! Per-item derivative pipeline.
//!
//! download -> thumbnail -> metadata upload -> ladder tiers -> source
//! cleanup -> report. Each step's failure aborts the rest of the job; the
//! job scope guarantees every temporary file is deleted exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn, Instrument};

use prevgen_client::{CoordinatorApi, ShardChannel, ShardGateway, SourceDownloader};
use prevgen_media::{scaled_suffix, DerivativeGenerator, MediaResult, THUMBNAIL_SUFFIX};
use prevgen_models::{JobOutcome, LocalFilePointer, QualityTier, ResolutionLadder, WorkItem};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics::{record_job, record_upload};
use crate::stats::WorkerStats;
use crate::tracker::{JobScope, ResourceTracker};

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Limit for each generator call as seen by the pipeline
    pub tool_timeout: Duration,
    /// Report unsupported media kinds as `invalid-file`
    pub report_invalid_files: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tool_timeout: Duration::from_secs(3600),
            report_invalid_files: false,
        }
    }
}

/// Runs one work item to a terminal outcome.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, item: WorkItem) -> JobOutcome;
}

/// The derivative pipeline and its collaborators.
pub struct JobPipeline {
    coordinator: Arc<dyn CoordinatorApi>,
    shards: Arc<dyn ShardGateway>,
    downloader: Arc<dyn SourceDownloader>,
    generator: Arc<dyn DerivativeGenerator>,
    tracker: Arc<ResourceTracker>,
    stats: Arc<WorkerStats>,
    config: PipelineConfig,
}

impl JobPipeline {
    pub fn new(
        coordinator: Arc<dyn CoordinatorApi>,
        shards: Arc<dyn ShardGateway>,
        downloader: Arc<dyn SourceDownloader>,
        generator: Arc<dyn DerivativeGenerator>,
        tracker: Arc<ResourceTracker>,
        stats: Arc<WorkerStats>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            coordinator,
            shards,
            downloader,
            generator,
            tracker,
            stats,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step for `item`, returning the number of uploaded tiers.
    async fn process(
        &self,
        scope: &JobScope,
        item: Arc<WorkItem>,
        logger: &JobLogger,
    ) -> WorkerResult<usize> {
        let key = item
            .storage_key()
            .ok_or_else(|| WorkerError::invalid_work_item("missing file key"))?
            .to_string();
        let domain = item
            .shard_domain()
            .ok_or_else(|| WorkerError::invalid_work_item("missing storage shard"))?;
        let channel = self
            .shards
            .channel(domain)
            .map_err(|e| WorkerError::invalid_work_item(e.to_string()))?;

        // Download
        let source = scope.allocate_source(Arc::clone(&item));
        let url = channel.source_url(&key);
        let bytes = self
            .downloader
            .download(&url, source.path())
            .await
            .map_err(WorkerError::Download)?;
        logger.log_progress(&format!("downloaded {} bytes", bytes));

        // Thumbnail + metadata upload
        let thumbnail_out = scope.derive(&source, THUMBNAIL_SUFFIX);
        let thumbnail = self
            .timed("thumbnail", self.generator.thumbnail(&source, thumbnail_out))
            .await?;

        let mut updated = (*item).clone();
        if let Some(meta) = thumbnail.metadata() {
            updated.apply_extracted(meta);
        }
        let item = Arc::new(updated);

        let patched = channel.patch_metadata(&item, thumbnail.path()).await;
        scope.release(&thumbnail).await;
        patched.map_err(WorkerError::Upload)?;
        logger.log_progress("metadata and thumbnail uploaded");

        // Resolution ladder
        let tiers = ResolutionLadder::tiers(item.ladder_height());
        debug!(
            ladder_input = item.ladder_height(),
            tiers = ?tiers,
            "Resolution ladder selected"
        );

        let mut uploaded = 0;
        for tier in tiers {
            self.upload_tier(scope, channel.as_ref(), &item, &source, tier)
                .await?;
            uploaded += 1;
            logger.log_progress(&format!("{} derivative uploaded", tier));
        }

        scope.release(&source).await;
        Ok(uploaded)
    }

    async fn upload_tier(
        &self,
        scope: &JobScope,
        channel: &dyn ShardChannel,
        item: &WorkItem,
        source: &LocalFilePointer,
        tier: QualityTier,
    ) -> WorkerResult<()> {
        let output = scope.derive(source, &scaled_suffix(item.kind(), tier));
        let scaled = self
            .timed("scale", self.generator.scale(source, tier, output))
            .await?;

        let uploaded = channel.create_preview(item, tier, scaled.path()).await;
        scope.release(&scaled).await;
        uploaded.map_err(WorkerError::Upload)?;

        self.stats.record_upload();
        record_upload(tier);
        Ok(())
    }

    /// Await a generator call under the pipeline's tool timeout.
    async fn timed<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = MediaResult<T>>,
    ) -> WorkerResult<T> {
        match tokio::time::timeout(self.config.tool_timeout, fut).await {
            Ok(result) => result.map_err(WorkerError::from),
            Err(_) => Err(WorkerError::Timeout {
                step,
                secs: self.config.tool_timeout.as_secs(),
            }),
        }
    }

    /// Tell the coordinator about a terminal outcome, best-effort.
    async fn report(&self, item: &WorkItem, outcome: JobOutcome, logger: &JobLogger) {
        let status = match outcome {
            JobOutcome::Finished => outcome.coordinator_status(),
            JobOutcome::InvalidFile if self.config.report_invalid_files => {
                outcome.coordinator_status()
            }
            _ => return,
        };

        if let Err(e) = self.coordinator.report_status(&item.id, status).await {
            logger.log_warning(&format!("status report failed: {}", e));
        }
    }
}

#[async_trait]
impl JobRunner for JobPipeline {
    async fn run_job(&self, item: WorkItem) -> JobOutcome {
        let logger = JobLogger::new(&item, "derivatives");
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&format!("{} item", item.kind()));

            let scope = self.tracker.scope();
            let result = self.process(&scope, Arc::new(item.clone()), &logger).await;
            let leftovers = scope.close().await;
            if leftovers > 0 {
                debug!(leftovers, "Released leftover temporary files");
            }

            let outcome = match &result {
                Ok(tiers) => {
                    logger.log_completion(&format!("{} tiers uploaded", tiers));
                    JobOutcome::Finished
                }
                Err(e) => {
                    let outcome = e.outcome();
                    if outcome == JobOutcome::InvalidFile {
                        logger.log_warning(&e.to_string());
                    } else {
                        logger.log_error(&e.to_string());
                        warn!(error_kind = e.kind().as_str(), "Job aborted");
                    }
                    outcome
                }
            };

            self.stats.record_outcome(outcome);
            record_job(outcome, started.elapsed().as_secs_f64());
            self.report(&item, outcome, &logger).await;
            outcome
        }
        .instrument(span)
        .await
    }
}
