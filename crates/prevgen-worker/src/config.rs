//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use prevgen_media::GeneratorConfig;

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::PipelineConfig;
use crate::schedule::{PollMode, PollSchedule};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs launched together per batch (never below 1)
    pub batch_size: usize,
    /// Delay between cycles
    pub poll_interval: Duration,
    /// Delay before the first cycle
    pub startup_delay: Duration,
    /// How the delay between cycles is chosen
    pub poll_mode: PollMode,
    /// Cap for the exponential schedule
    pub poll_max_delay: Duration,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Hard limit for each generator call
    pub tool_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Report unsupported media kinds to the coordinator as `invalid-file`
    pub report_invalid_files: bool,
    /// Thumbnail bounding box edge length
    pub thumbnail_max_dimension: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            poll_interval: Duration::from_secs(10),
            startup_delay: Duration::from_secs(1),
            poll_mode: PollMode::Fixed,
            poll_max_delay: Duration::from_secs(300),
            work_dir: std::env::temp_dir().join("prevgen"),
            tool_timeout: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(60),
            report_invalid_files: false,
            thumbnail_max_dimension: 900,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let poll_mode = match std::env::var("WORKER_POLL_BACKOFF") {
            Ok(raw) => raw.parse::<PollMode>().map_err(WorkerError::config_error)?,
            Err(_) => defaults.poll_mode,
        };

        let report_invalid_files = match std::env::var("WORKER_REPORT_INVALID_FILES") {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                WorkerError::config_error(format!(
                    "WORKER_REPORT_INVALID_FILES must be true or false, got '{}'",
                    raw
                ))
            })?,
            Err(_) => defaults.report_invalid_files,
        };

        Ok(Self {
            batch_size: std::env::var("WORKER_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.batch_size)
                .max(1),
            poll_interval: secs_var("WORKER_POLL_INTERVAL_SECS", 10),
            startup_delay: secs_var("WORKER_STARTUP_DELAY_SECS", 1),
            poll_mode,
            poll_max_delay: secs_var("WORKER_POLL_MAX_DELAY_SECS", 300),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            tool_timeout: secs_var("WORKER_TOOL_TIMEOUT_SECS", 3600),
            shutdown_timeout: secs_var("WORKER_SHUTDOWN_TIMEOUT_SECS", 60),
            report_invalid_files,
            thumbnail_max_dimension: std::env::var("THUMBNAIL_MAX_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&d: &u32| d > 0)
                .unwrap_or(defaults.thumbnail_max_dimension),
        })
    }

    /// Schedule deciding the sleep after each cycle.
    pub fn poll_schedule(&self) -> PollSchedule {
        match self.poll_mode {
            PollMode::Fixed => PollSchedule::Fixed(self.poll_interval),
            PollMode::Exponential => PollSchedule::Backoff {
                base: self.poll_interval,
                max: self.poll_max_delay,
            },
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            tool_timeout: self.tool_timeout,
            report_invalid_files: self.report_invalid_files,
        }
    }

    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig {
            tool_timeout: self.tool_timeout,
            thumbnail_max_dimension: self.thumbnail_max_dimension,
            ..GeneratorConfig::default()
        }
    }
}

fn secs_var(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
