//! WorkerLoop lifecycle, failure tolerance and shutdown draining.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{quick_settings, sorted, video_item, Fakes, SHARD};
use prevgen_client::{ClientConfig, ClientError, CoordinatorClient};
use prevgen_models::{LocalFilePointer, MediaKind, WorkItem};
use prevgen_worker::{
    BatchScheduler, ErrorKind, JobRunner, LoopSettings, PollSchedule, ResourceTracker, WorkerLoop,
    WorkerStats,
};

async fn wait_for_fetches(h: &common::Harness, count: usize) {
    for _ in 0..1000 {
        if h.coordinator.fetch_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("loop never reached {} fetches", count);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let h = Fakes::new().build();
    let worker = h.worker(1, quick_settings());

    assert!(worker.start());
    assert!(!worker.start());
    assert!(worker.is_started());
    assert!(worker.status().running);

    wait_for_fetches(&h, 2).await;
    worker.shutdown().await;
    assert!(!worker.status().running);
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_fetch_failures() {
    let h = Fakes::new().build();
    h.coordinator
        .respond(Err(ClientError::unavailable("503 from coordinator")));
    h.coordinator
        .respond(Err(ClientError::unavailable("malformed work list")));
    h.coordinator.respond(Ok(vec![video_item("a", 1280, 720)]));

    let worker = h.worker(1, quick_settings());
    worker.start();
    wait_for_fetches(&h, 4).await;
    worker.shutdown().await;

    let status = worker.status();
    assert_eq!(status.finished, 1);
    assert_eq!(status.uploads, 2);
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_job_panics() {
    struct Exploding;

    #[async_trait::async_trait]
    impl JobRunner for Exploding {
        async fn run_job(&self, _item: WorkItem) -> prevgen_models::JobOutcome {
            panic!("decoder crashed");
        }
    }

    let h = Fakes::new().build();
    h.coordinator.respond(Ok(vec![video_item("a", 1280, 720)]));
    let worker = Arc::new(WorkerLoop::new(
        h.coordinator.clone(),
        Arc::new(BatchScheduler::new(Arc::new(Exploding), 1)),
        Arc::clone(&h.tracker),
        Arc::clone(&h.stats),
        quick_settings(),
    ));

    worker.start();
    wait_for_fetches(&h, 3).await;
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_startup_delay_holds_first_fetch() {
    let h = Fakes::new().build();
    let worker = h.worker(
        1,
        LoopSettings {
            startup_delay: Duration::from_secs(1),
            ..quick_settings()
        },
    );

    worker.start();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.coordinator.fetch_count(), 0);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(h.coordinator.fetch_count() >= 1);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_startup_delay_never_fetches() {
    let h = Fakes::new().build();
    let worker = h.worker(
        1,
        LoopSettings {
            startup_delay: Duration::from_secs(60),
            schedule: PollSchedule::Fixed(Duration::from_secs(10)),
            shutdown_timeout: Duration::from_secs(5),
        },
    );

    worker.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    worker.shutdown().await;
    assert_eq!(h.coordinator.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_tracked_files() {
    let h = Fakes::new().build();
    let item = Arc::new(video_item("a", 1280, 720));
    h.tracker
        .track(&LocalFilePointer::new("/work/orphan-1.mp4", item.clone()));
    h.tracker
        .track(&LocalFilePointer::new("/work/orphan-2.mp4", item));

    let worker = h.worker(1, quick_settings());
    worker.start();

    assert_eq!(worker.shutdown().await, 2);
    assert_eq!(h.tracker.pending(), 0);
    assert_eq!(h.log.removed().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abort_releases_stuck_job_files() {
    let mut fakes = Fakes::new();
    fakes.generator.delay = Duration::from_secs(3000);
    let h = fakes.build();
    h.coordinator.respond(Ok(vec![video_item("stuck", 1920, 1080)]));

    let worker = h.worker(1, quick_settings());
    worker.start();
    for _ in 0..1000 {
        if h.log.labels().contains(&"thumbnail".to_string()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.tracker.pending() > 0);

    worker.shutdown().await;
    // Let the dropped job scope finish its own release
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.tracker.pending(), 0);
    assert_eq!(sorted(h.log.created()), sorted(h.log.removed()));
    assert!(h.log.uploads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_cycle_reports_fetch_failure() {
    let h = Fakes::new().build();
    h.coordinator
        .respond(Err(ClientError::unavailable("coordinator down")));
    let worker = h.worker(1, quick_settings());

    let err = tokio_test::assert_err!(worker.run_cycle().await);
    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert!(!worker.is_started());
}

#[tokio::test]
async fn test_drain_deletes_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = Arc::new(ResourceTracker::with_tokio_fs(dir.path()));
    let item = Arc::new(WorkItem::new("a", "u/a.jpg", MediaKind::Image));

    let scope = tracker.scope();
    let source = scope.allocate_source(item);
    tokio::fs::write(source.path(), b"jpeg bytes").await.unwrap();
    let never_written = scope.derive(&source, "_480p.jpeg");

    assert_eq!(tracker.drain_all().await, 2);
    assert!(!source.path().exists());
    assert!(!never_written.path().exists());
    assert_eq!(scope.close().await, 0);
}

#[tokio::test]
async fn test_cycle_against_http_coordinator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coordinator/v1/find-file-work"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [
                {
                    "id": "f1",
                    "fileKey": "u/f1.mp4",
                    "fileType": "VIDEO",
                    "itemWidth": 1920,
                    "itemHeight": 1080,
                    "serverShard": {"domain": SHARD}
                },
                {
                    "id": "f2",
                    "fileKey": "u/f2.txt",
                    "fileType": "PLAINTEXT",
                    "serverShard": {"domain": SHARD}
                }
            ]
        })))
        .mount(&server)
        .await;

    let h = Fakes::new().build();
    let config = ClientConfig::new(&server.uri(), "test-key", "server-7").unwrap();
    let coordinator = Arc::new(CoordinatorClient::new(config).unwrap());
    let worker = WorkerLoop::new(
        coordinator,
        h.scheduler(1),
        Arc::clone(&h.tracker),
        Arc::new(WorkerStats::new()),
        quick_settings(),
    );

    let report = tokio_test::assert_ok!(worker.run_cycle().await);
    assert_eq!(report.batches, 2);
    assert_eq!(report.finished, 1);
    assert_eq!(report.invalid, 1);
    assert_eq!(h.log.uploads().len(), 3);
}
