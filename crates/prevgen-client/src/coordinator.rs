//! Coordinator REST client.
//!
//! Two endpoints are consumed:
//! - `GET /coordinator/v1/find-file-work` returns the assignable work list
//! - `POST /coordinator/v1/mark-file` records a terminal file status

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use prevgen_models::{ApiEnvelope, CoordinatorStatus, MarkFileRequest, WorkItem, WorkItemId};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;

pub const FIND_WORK_PATH: &str = "/coordinator/v1/find-file-work";
pub const MARK_FILE_PATH: &str = "/coordinator/v1/mark-file";

/// Work-list source and status sink.
#[async_trait]
pub trait CoordinatorApi: Send + Sync {
    /// Currently assignable work.
    ///
    /// Fails with [`ClientError::CoordinatorUnavailable`] on a non-2xx status
    /// or a payload without a `data` array.
    async fn fetch_work(&self) -> ClientResult<Vec<WorkItem>>;

    /// Record a terminal status for one item. Sent once, never retried.
    async fn report_status(
        &self,
        id: &WorkItemId,
        status: Option<CoordinatorStatus>,
    ) -> ClientResult<()>;
}

/// Headers identifying this worker to the coordinator and to shards.
pub(crate) fn auth_headers(config: &ClientConfig) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let api_key = HeaderValue::from_str(&config.api_key)
        .map_err(|_| ClientError::config("COORDINATOR_API_KEY is not a valid header value"))?;
    let server_id = HeaderValue::from_str(&config.server_id)
        .map_err(|_| ClientError::config("COORDINATOR_SERVER_ID is not a valid header value"))?;
    headers.insert("x-api-key", api_key);
    headers.insert("x-server-id", server_id);
    Ok(headers)
}

/// Coordinator client over `reqwest`.
#[derive(Clone)]
pub struct CoordinatorClient {
    http: Client,
    config: ClientConfig,
}

impl CoordinatorClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .default_headers(auth_headers(&config)?)
            .timeout(config.coordinator_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("prevgen-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    async fn execute_request<T, F>(&self, endpoint: &str, fut: F) -> ClientResult<T>
    where
        F: std::future::Future<Output = ClientResult<T>>,
    {
        let span = info_span!("coordinator_request", endpoint = %endpoint);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(endpoint, status, latency_ms);

        result
    }
}

#[async_trait]
impl CoordinatorApi for CoordinatorClient {
    async fn fetch_work(&self) -> ClientResult<Vec<WorkItem>> {
        let url = self.config.coordinator_endpoint(FIND_WORK_PATH);

        self.execute_request("find-file-work", async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| ClientError::unavailable(format!("{} unreachable: {}", url, e)))?;
            let status = response.status();

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::unavailable(format!(
                    "{} returned {}: {}",
                    url, status, body
                )));
            }

            let envelope: ApiEnvelope<Vec<Value>> = response
                .json()
                .await
                .map_err(|e| ClientError::unavailable(format!("malformed work list: {}", e)))?;
            let raw = envelope
                .into_data()
                .ok_or_else(|| ClientError::unavailable("work list response has no data"))?;

            Ok(decode_work_items(raw))
        })
        .await
    }

    async fn report_status(
        &self,
        id: &WorkItemId,
        status: Option<CoordinatorStatus>,
    ) -> ClientResult<()> {
        let url = self.config.coordinator_endpoint(MARK_FILE_PATH);
        let body = MarkFileRequest {
            file_id: id.clone(),
            status,
        };

        self.execute_request("mark-file", async {
            let response = self.http.post(&url).json(&body).send().await?;
            let code = response.status();
            if !code.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ClientError::unavailable(format!(
                    "mark-file for {} returned {}: {}",
                    id, code, text
                )));
            }
            debug!(work_item_id = %id, status = ?status, "Reported file status");
            Ok(())
        })
        .await
    }
}

/// Decode work items one at a time so a single bad entry does not hide the rest.
fn decode_work_items(raw: Vec<Value>) -> Vec<WorkItem> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<WorkItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable work item");
                None
            }
        })
        .collect()
}
