//! The polling loop driving the worker.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use prevgen_client::CoordinatorApi;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics::record_cycle;
use crate::schedule::PollSchedule;
use crate::scheduler::{panic_message, BatchReport, BatchScheduler};
use crate::stats::{WorkerStats, WorkerStatus};
use crate::tracker::ResourceTracker;

/// Timing of the loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub startup_delay: Duration,
    pub schedule: PollSchedule,
    /// How long shutdown waits for an in-flight cycle
    pub shutdown_timeout: Duration,
}

impl From<&WorkerConfig> for LoopSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            startup_delay: config.startup_delay,
            schedule: config.poll_schedule(),
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// Fetches work and hands it to the scheduler, forever.
///
/// A failed or panicking cycle is logged and the next one is scheduled
/// anyway. Only [`WorkerLoop::shutdown`] stops the loop.
pub struct WorkerLoop {
    coordinator: Arc<dyn CoordinatorApi>,
    scheduler: Arc<BatchScheduler>,
    tracker: Arc<ResourceTracker>,
    stats: Arc<WorkerStats>,
    settings: LoopSettings,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerLoop {
    pub fn new(
        coordinator: Arc<dyn CoordinatorApi>,
        scheduler: Arc<BatchScheduler>,
        tracker: Arc<ResourceTracker>,
        stats: Arc<WorkerStats>,
        settings: LoopSettings,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            coordinator,
            scheduler,
            tracker,
            stats,
            settings,
            started: AtomicBool::new(false),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the loop. Returns `false` if it was already started.
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Worker loop already started");
            return false;
        }

        info!(
            batch_size = self.scheduler.batch_size(),
            startup_delay_ms = self.settings.startup_delay.as_millis() as u64,
            "Starting worker loop"
        );
        self.stats.set_running(true);

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.lock_handle() = Some(handle);
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> WorkerStatus {
        self.stats.status()
    }

    /// One fetch-and-schedule cycle.
    pub async fn run_cycle(&self) -> WorkerResult<BatchReport> {
        let items = self
            .coordinator
            .fetch_work()
            .await
            .map_err(WorkerError::Fetch)?;

        if items.is_empty() {
            debug!("No work available");
        }
        Ok(self.scheduler.run(items).await)
    }

    /// Stop scheduling cycles and delete every tracked file.
    ///
    /// Waits up to the shutdown timeout for an in-flight cycle, aborting it
    /// after that. Returns the number of files drained.
    pub async fn shutdown(&self) -> usize {
        self.shutdown.send_replace(true);

        let handle = self.lock_handle().take();
        if let Some(mut handle) = handle {
            info!("Waiting for in-flight cycle to complete...");
            match tokio::time::timeout(self.settings.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Worker loop task ended abnormally"),
                Err(_) => {
                    warn!(
                        timeout_secs = self.settings.shutdown_timeout.as_secs(),
                        "In-flight cycle did not finish in time, aborting"
                    );
                    handle.abort();
                    // The task only stops at its next await; wait for that
                    // so nothing registers a path after the drain below
                    if let Err(e) = handle.await {
                        if !e.is_cancelled() {
                            warn!(error = %e, "Worker loop task ended abnormally");
                        }
                    }
                }
            }
        }

        let drained = self.tracker.drain_all().await;
        self.stats.set_running(false);
        info!(drained, "Worker loop stopped");
        drained
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();

        if wait_or_shutdown(&mut shutdown_rx, self.settings.startup_delay).await {
            return;
        }

        let mut failures: u32 = 0;
        loop {
            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(Ok(report)) => {
                    failures = 0;
                    record_cycle("ok");
                    if report.jobs() > 0 {
                        info!(
                            jobs = report.jobs(),
                            finished = report.finished,
                            "Cycle complete"
                        );
                    }
                }
                Ok(Err(e)) => {
                    failures = failures.saturating_add(1);
                    record_cycle("failed");
                    error!(error = %e, consecutive_failures = failures, "Cycle failed");
                }
                Err(panic) => {
                    failures = failures.saturating_add(1);
                    record_cycle("panicked");
                    error!(panic = %panic_message(&*panic), "Cycle panicked");
                }
            }

            let delay = self.settings.schedule.next_delay(failures);
            if wait_or_shutdown(&mut shutdown_rx, delay).await {
                break;
            }
        }
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sleep for `delay` unless shutdown is signalled first.
///
/// Returns `true` when the loop should stop.
async fn wait_or_shutdown(rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *rx.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(delay) => *rx.borrow(),
        changed = rx.changed() => changed.is_err() || *rx.borrow(),
    }
}
