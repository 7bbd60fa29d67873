//! Preview derivative worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prevgen_client::{ClientConfig, CoordinatorClient, HttpDownloader, ShardClientFactory};
use prevgen_media::MediaToolGenerator;
use prevgen_worker::{
    BatchScheduler, JobPipeline, LoopSettings, ResourceTracker, WorkerConfig, WorkerLoop,
    WorkerStats,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting prevgen-worker");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => match PrometheusBuilder::new().with_http_listener(addr).install() {
                Ok(()) => info!(%addr, "Serving Prometheus metrics"),
                Err(e) => warn!("Failed to install metrics exporter: {}", e),
            },
            Err(e) => warn!("Ignoring invalid METRICS_ADDR '{}': {}", addr, e),
        }
    }

    let client_config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid client configuration: {}", e);
            std::process::exit(1);
        }
    };

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    let tracker = Arc::new(ResourceTracker::with_tokio_fs(&config.work_dir));
    if let Err(e) = tracker.ensure_work_dir().await {
        error!(
            "Failed to create work directory {}: {}",
            config.work_dir.display(),
            e
        );
        std::process::exit(1);
    }

    let coordinator = match CoordinatorClient::new(client_config.clone()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create coordinator client: {}", e);
            std::process::exit(1);
        }
    };
    let shards = match ShardClientFactory::new(&client_config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create shard client: {}", e);
            std::process::exit(1);
        }
    };
    let downloader = match HttpDownloader::new(&client_config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("Failed to create downloader: {}", e);
            std::process::exit(1);
        }
    };

    let stats = Arc::new(WorkerStats::new());
    let pipeline = Arc::new(JobPipeline::new(
        coordinator.clone(),
        shards,
        downloader,
        Arc::new(MediaToolGenerator::new(config.generator())),
        Arc::clone(&tracker),
        Arc::clone(&stats),
        config.pipeline(),
    ));
    let scheduler = Arc::new(BatchScheduler::new(pipeline, config.batch_size));

    let worker = Arc::new(WorkerLoop::new(
        coordinator,
        scheduler,
        tracker,
        stats,
        LoopSettings::from(&config),
    ));
    worker.start();

    // Wait for shutdown
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");

    let drained = worker.shutdown().await;
    info!(
        drained,
        status = ?worker.status(),
        "Worker shutdown complete"
    );
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["prevgen=info", "prevgen_worker=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
