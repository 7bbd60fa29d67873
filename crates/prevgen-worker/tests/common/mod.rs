//! Recording fakes for the worker's collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use prevgen_client::{
    ClientError, ClientResult, CoordinatorApi, ShardChannel, ShardGateway, SourceDownloader,
};
use prevgen_media::{DerivativeGenerator, MediaError, MediaResult, THUMBNAIL_SUFFIX};
use prevgen_models::{
    CoordinatorStatus, ExtractedMetadata, LocalFilePointer, MediaKind, QualityTier, StorageShard,
    WorkItem, WorkItemId,
};
use prevgen_worker::{
    BatchScheduler, Filesystem, JobPipeline, LoopSettings, PipelineConfig, PollSchedule,
    ResourceTracker, WorkerLoop, WorkerStats,
};

pub const SHARD: &str = "shard-1.example.net";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Download { id: String, path: PathBuf },
    Thumbnail { id: String, output: PathBuf },
    Scale { id: String, tier: QualityTier, output: PathBuf },
    PatchMetadata { id: String, width: Option<u32>, height: Option<u32> },
    Preview { id: String, tier: QualityTier },
    Remove { path: PathBuf },
    Report { id: String, status: Option<CoordinatorStatus> },
}

/// Shared, ordered record of every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Every path a job created (download target and generator outputs).
    pub fn created(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Download { path, .. } => Some(path),
                Event::Thumbnail { output, .. } => Some(output),
                Event::Scale { output, .. } => Some(output),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Remove { path } => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<QualityTier> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Preview { tier, .. } => Some(tier),
                _ => None,
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<(String, Option<CoordinatorStatus>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Report { id, status } => Some((id, status)),
                _ => None,
            })
            .collect()
    }

    /// Compact labels, e.g. `scale:720p` or `remove:thumbnail`.
    pub fn labels(&self) -> Vec<String> {
        self.events().iter().map(label).collect()
    }
}

fn label(event: &Event) -> String {
    match event {
        Event::Download { .. } => "download".to_string(),
        Event::Thumbnail { .. } => "thumbnail".to_string(),
        Event::Scale { tier, .. } => format!("scale:{}", tier),
        Event::PatchMetadata { .. } => "patch".to_string(),
        Event::Preview { tier, .. } => format!("preview:{}", tier),
        Event::Remove { path } => {
            let name = path.to_string_lossy();
            if name.ends_with(THUMBNAIL_SUFFIX) {
                "remove:thumbnail".to_string()
            } else if let Some(tier) = QualityTier::LADDER
                .iter()
                .find(|t| name.contains(&format!("_{}.", t)))
            {
                format!("remove:{}", tier)
            } else {
                "remove:source".to_string()
            }
        }
        Event::Report { status, .. } => format!("report:{:?}", status),
    }
}

pub fn video_item(id: &str, width: u32, height: u32) -> WorkItem {
    WorkItem::new(id, format!("u/{}.mp4", id), MediaKind::Video)
        .with_dimensions(width, height)
        .with_shard(StorageShard::new(SHARD))
}

pub fn item_of_kind(id: &str, kind: MediaKind) -> WorkItem {
    WorkItem::new(id, format!("u/{}.bin", id), kind)
        .with_dimensions(1920, 1080)
        .with_shard(StorageShard::new(SHARD))
}

// Coordinator

pub struct FakeCoordinator {
    log: EventLog,
    script: Mutex<VecDeque<ClientResult<Vec<WorkItem>>>>,
    pub fetches: AtomicUsize,
    pub fail_reports: bool,
}

impl FakeCoordinator {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            script: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
            fail_reports: false,
        }
    }

    /// Queue the response for the next fetch. An empty script answers with
    /// an empty work list.
    pub fn respond(&self, response: ClientResult<Vec<WorkItem>>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinatorApi for FakeCoordinator {
    async fn fetch_work(&self) -> ClientResult<Vec<WorkItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn report_status(
        &self,
        id: &WorkItemId,
        status: Option<CoordinatorStatus>,
    ) -> ClientResult<()> {
        self.log.push(Event::Report {
            id: id.to_string(),
            status,
        });
        if self.fail_reports {
            return Err(ClientError::unavailable("mark-file returned 502"));
        }
        Ok(())
    }
}

// Shards

#[derive(Clone)]
pub struct FakeShards {
    log: EventLog,
    pub fail_metadata: bool,
    pub fail_preview_at: Option<QualityTier>,
}

impl FakeShards {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_metadata: false,
            fail_preview_at: None,
        }
    }
}

struct FakeChannel {
    domain: String,
    shards: FakeShards,
}

impl ShardGateway for FakeShards {
    fn channel(&self, domain: &str) -> ClientResult<Arc<dyn ShardChannel>> {
        Ok(Arc::new(FakeChannel {
            domain: domain.to_string(),
            shards: self.clone(),
        }))
    }
}

#[async_trait]
impl ShardChannel for FakeChannel {
    fn source_url(&self, file_key: &str) -> String {
        format!("https://{}/{}", self.domain, file_key)
    }

    async fn patch_metadata(&self, item: &WorkItem, _thumbnail: &Path) -> ClientResult<()> {
        self.shards.log.push(Event::PatchMetadata {
            id: item.id.to_string(),
            width: item.item_width,
            height: item.item_height,
        });
        if self.shards.fail_metadata {
            return Err(upload_failed("/s2s/metadata-patch"));
        }
        Ok(())
    }

    async fn create_preview(
        &self,
        item: &WorkItem,
        tier: QualityTier,
        _derivative: &Path,
    ) -> ClientResult<()> {
        self.shards.log.push(Event::Preview {
            id: item.id.to_string(),
            tier,
        });
        if self.shards.fail_preview_at == Some(tier) {
            return Err(upload_failed("/s2s/preview-create"));
        }
        Ok(())
    }
}

fn upload_failed(endpoint: &str) -> ClientError {
    ClientError::UploadFailed {
        endpoint: endpoint.to_string(),
        status: 500,
        body: "shard error".to_string(),
    }
}

// Downloader

pub struct FakeDownloader {
    log: EventLog,
    pub fail: bool,
}

impl FakeDownloader {
    pub fn new(log: EventLog) -> Self {
        Self { log, fail: false }
    }
}

#[async_trait]
impl SourceDownloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ClientResult<u64> {
        let id = url
            .rsplit('/')
            .next()
            .and_then(|name| name.split('.').next())
            .unwrap_or_default()
            .to_string();
        self.log.push(Event::Download {
            id,
            path: dest.to_path_buf(),
        });
        if self.fail {
            return Err(ClientError::download_failed(url, Some(404), "not found"));
        }
        Ok(4096)
    }
}

// Generator

pub struct FakeGenerator {
    log: EventLog,
    /// Dimensions reported by the thumbnail step; `None` reports zeros
    pub source_dims: Option<(u32, u32)>,
    pub fail_thumbnail: bool,
    pub fail_scale_at: Option<QualityTier>,
    /// Simulated tool run time for every call
    pub delay: Duration,
}

impl FakeGenerator {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            source_dims: None,
            fail_thumbnail: false,
            fail_scale_at: None,
            delay: Duration::ZERO,
        }
    }

    async fn work(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl DerivativeGenerator for FakeGenerator {
    async fn thumbnail(
        &self,
        input: &LocalFilePointer,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer> {
        let kind = input.item().kind();
        if !kind.is_processable() {
            return Err(MediaError::UnsupportedMediaKind(kind));
        }

        self.log.push(Event::Thumbnail {
            id: input.item().id.to_string(),
            output: output.path().to_path_buf(),
        });
        self.work().await;
        if self.fail_thumbnail {
            return Err(MediaError::internal("frame extraction failed"));
        }

        let (width, height) = self.source_dims.unwrap_or((0, 0));
        Ok(output.with_metadata(ExtractedMetadata {
            width,
            height,
            preview_hash: Some("LEHV6nWB2yk8pyo0adR*.7kCMdnj".to_string()),
        }))
    }

    async fn scale(
        &self,
        input: &LocalFilePointer,
        tier: QualityTier,
        output: LocalFilePointer,
    ) -> MediaResult<LocalFilePointer> {
        self.log.push(Event::Scale {
            id: input.item().id.to_string(),
            tier,
            output: output.path().to_path_buf(),
        });
        self.work().await;
        if self.fail_scale_at == Some(tier) {
            return Err(MediaError::ffmpeg_failed("pass 2 failed", None, Some(1)));
        }
        Ok(output)
    }
}

// Filesystem

pub struct FakeFilesystem {
    log: EventLog,
}

impl FakeFilesystem {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Filesystem for FakeFilesystem {
    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.log.push(Event::Remove {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

// Wiring

pub struct Fakes {
    pub log: EventLog,
    pub coordinator: FakeCoordinator,
    pub shards: FakeShards,
    pub downloader: FakeDownloader,
    pub generator: FakeGenerator,
    pub config: PipelineConfig,
}

impl Fakes {
    pub fn new() -> Self {
        let log = EventLog::default();
        Self {
            coordinator: FakeCoordinator::new(log.clone()),
            shards: FakeShards::new(log.clone()),
            downloader: FakeDownloader::new(log.clone()),
            generator: FakeGenerator::new(log.clone()),
            config: PipelineConfig::default(),
            log,
        }
    }

    pub fn build(self) -> Harness {
        let tracker = Arc::new(ResourceTracker::new(
            "/work",
            Arc::new(FakeFilesystem::new(self.log.clone())),
        ));
        let stats = Arc::new(WorkerStats::new());
        let coordinator = Arc::new(self.coordinator);
        let pipeline = Arc::new(JobPipeline::new(
            coordinator.clone(),
            Arc::new(self.shards),
            Arc::new(self.downloader),
            Arc::new(self.generator),
            Arc::clone(&tracker),
            Arc::clone(&stats),
            self.config,
        ));

        Harness {
            log: self.log,
            coordinator,
            tracker,
            stats,
            pipeline,
        }
    }
}

pub struct Harness {
    pub log: EventLog,
    pub coordinator: Arc<FakeCoordinator>,
    pub tracker: Arc<ResourceTracker>,
    pub stats: Arc<WorkerStats>,
    pub pipeline: Arc<JobPipeline>,
}

impl Harness {
    pub fn scheduler(&self, batch_size: usize) -> Arc<BatchScheduler> {
        Arc::new(BatchScheduler::new(self.pipeline.clone(), batch_size))
    }

    pub fn worker(&self, batch_size: usize, settings: LoopSettings) -> Arc<WorkerLoop> {
        Arc::new(WorkerLoop::new(
            self.coordinator.clone(),
            self.scheduler(batch_size),
            Arc::clone(&self.tracker),
            Arc::clone(&self.stats),
            settings,
        ))
    }
}

pub fn quick_settings() -> LoopSettings {
    LoopSettings {
        startup_delay: Duration::ZERO,
        schedule: PollSchedule::Fixed(Duration::from_millis(10)),
        shutdown_timeout: Duration::from_secs(5),
    }
}

/// Sorted copy, for comparing path sets.
pub fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}
