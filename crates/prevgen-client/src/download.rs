//! Streamed source downloads.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::{record_download_bytes, record_request};

/// Fetches a remote object into a local file.
#[async_trait]
pub trait SourceDownloader: Send + Sync {
    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// On failure `dest` may hold a partial file; removing it is the
    /// caller's job.
    async fn download(&self, url: &str, dest: &Path) -> ClientResult<u64>;
}

/// [`SourceDownloader`] over plain HTTP GET.
#[derive(Clone)]
pub struct HttpDownloader {
    http: Client,
}

impl HttpDownloader {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.download_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("prevgen-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> ClientResult<u64> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| {
                ClientError::download_failed(url, e.status().map(|s| s.as_u16()), e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::download_failed(
                url,
                Some(status.as_u16()),
                format!("unexpected response {}", status),
            ));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::download_failed(url, None, e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl SourceDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ClientResult<u64> {
        debug!(url = %url, dest = %dest.display(), "Starting download");
        let start = Instant::now();

        let result = self.stream_to_file(url, dest).await;
        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request("source-download", status, start.elapsed().as_millis() as f64);

        let bytes = result?;
        record_download_bytes(bytes);
        info!(
            url = %url,
            bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Download finished"
        );
        Ok(bytes)
    }
}
