//! HTTP client configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Settings shared by the coordinator, shard and download clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator base URL
    pub coordinator_url: Url,
    /// Sent as `x-api-key`
    pub api_key: String,
    /// Sent as `x-server-id`
    pub server_id: String,
    /// Coordinator request timeout
    pub coordinator_timeout: Duration,
    /// Connect timeout for every client
    pub connect_timeout: Duration,
    /// Scheme used to reach storage shards
    pub shard_scheme: String,
    /// Shard upload request timeout
    pub upload_timeout: Duration,
    /// Whole-transfer timeout for source downloads
    pub download_timeout: Duration,
}

impl ClientConfig {
    /// Config with default timeouts.
    pub fn new(
        coordinator_url: &str,
        api_key: impl Into<String>,
        server_id: impl Into<String>,
    ) -> ClientResult<Self> {
        Ok(Self {
            coordinator_url: parse_base_url(coordinator_url)?,
            api_key: api_key.into(),
            server_id: server_id.into(),
            coordinator_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            shard_scheme: "https".to_string(),
            upload_timeout: Duration::from_secs(300),
            download_timeout: Duration::from_secs(1800),
        })
    }

    /// Create config from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let coordinator_url = required("COORDINATOR_URL")?;
        let api_key = required("COORDINATOR_API_KEY")?;
        let server_id = required("COORDINATOR_SERVER_ID")?;

        let mut config = Self::new(&coordinator_url, api_key, server_id)?;
        config.coordinator_timeout = secs_var("COORDINATOR_TIMEOUT_SECS", 30);
        config.connect_timeout = secs_var("HTTP_CONNECT_TIMEOUT_SECS", 10);
        config.upload_timeout = secs_var("SHARD_UPLOAD_TIMEOUT_SECS", 300);
        config.download_timeout = secs_var("DOWNLOAD_TIMEOUT_SECS", 1800);

        let scheme = std::env::var("SHARD_SCHEME").unwrap_or_else(|_| "https".to_string());
        config.shard_scheme = match scheme.to_ascii_lowercase().as_str() {
            s @ ("http" | "https") => s.to_string(),
            other => {
                return Err(ClientError::config(format!(
                    "SHARD_SCHEME must be http or https, got '{}'",
                    other
                )))
            }
        };

        Ok(config)
    }

    /// Coordinator endpoint URL for `path` (e.g. `/coordinator/v1/mark-file`).
    pub fn coordinator_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.coordinator_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn required(name: &str) -> ClientResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ClientError::config(format!("{} must be set", name))),
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

fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ClientError::config(format!("Invalid COORDINATOR_URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::config(format!(
            "COORDINATOR_URL must be http(s), got '{}'",
            raw
        )));
    }
    Ok(url)
}
