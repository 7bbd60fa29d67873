//! Storage shard upload client.
//!
//! Each job talks to the shard that owns its file through a [`ShardChannel`]
//! bound to that shard's base URL. Channels share one pooled HTTP client.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info_span, Instrument};

use prevgen_models::{QualityTier, WorkItem};

use crate::config::ClientConfig;
use crate::coordinator::auth_headers;
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;

pub const METADATA_PATCH_PATH: &str = "/s2s/metadata-patch";
pub const PREVIEW_CREATE_PATH: &str = "/s2s/preview-create";

const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// Opens upload channels to storage shards.
pub trait ShardGateway: Send + Sync {
    /// Channel to the shard at `domain`.
    fn channel(&self, domain: &str) -> ClientResult<Arc<dyn ShardChannel>>;
}

/// Authenticated upload channel to one shard.
#[async_trait]
pub trait ShardChannel: Send + Sync {
    /// URL of the original object stored under `file_key`.
    fn source_url(&self, file_key: &str) -> String;

    /// Upload the item's metadata together with its thumbnail.
    async fn patch_metadata(&self, item: &WorkItem, thumbnail: &Path) -> ClientResult<()>;

    /// Upload the `tier` derivative of the item.
    async fn create_preview(
        &self,
        item: &WorkItem,
        tier: QualityTier,
        derivative: &Path,
    ) -> ClientResult<()>;
}

/// Multipart file name of an item's thumbnail.
pub fn thumbnail_file_name(file_key: &str) -> String {
    format!("{}_thumbnail.jpg", file_key)
}

/// Multipart file name of an item's `tier` derivative.
pub fn preview_file_name(item: &WorkItem, tier: QualityTier) -> String {
    format!(
        "{}_{}p.{}",
        item.file_key.as_deref().unwrap_or_default(),
        tier.label(),
        item.kind().derivative_extension()
    )
}

/// [`ShardGateway`] over HTTP.
#[derive(Clone)]
pub struct ShardClientFactory {
    http: Client,
    scheme: String,
}

impl ShardClientFactory {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .default_headers(auth_headers(config)?)
            .timeout(config.upload_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("prevgen-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            scheme: config.shard_scheme.clone(),
        })
    }
}

impl ShardGateway for ShardClientFactory {
    fn channel(&self, domain: &str) -> ClientResult<Arc<dyn ShardChannel>> {
        let domain = domain.trim().trim_end_matches('/');
        if domain.is_empty() {
            return Err(ClientError::invalid_work_item("shard domain is empty"));
        }

        let base_url = format!("{}://{}", self.scheme, domain);
        url::Url::parse(&base_url).map_err(|e| {
            ClientError::invalid_work_item(format!("bad shard domain '{}': {}", domain, e))
        })?;

        Ok(Arc::new(HttpShardChannel {
            http: self.http.clone(),
            base_url,
        }))
    }
}

/// Upload channel bound to one shard's base URL.
pub struct HttpShardChannel {
    http: Client,
    base_url: String,
}

impl HttpShardChannel {
    fn item_json(item: &WorkItem) -> ClientResult<String> {
        Ok(serde_json::to_string(&item.normalized())?)
    }

    async fn file_part(path: &Path, file_name: String, content_type: &str) -> ClientResult<Part> {
        let bytes = tokio::fs::read(path).await?;
        Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(ClientError::Network)
    }

    async fn post_form(&self, path: &'static str, form: Form) -> ClientResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let span = info_span!("shard_request", endpoint = %path, shard = %self.base_url);

        let start = Instant::now();
        let result = async {
            let response = self.http.post(&url).multipart(form).send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::UploadFailed {
                endpoint: url.clone(),
                status: status.as_u16(),
                body,
            })
        }
        .instrument(span)
        .await;

        let status = match &result {
            Ok(()) => 200,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(path, status, start.elapsed().as_millis() as f64);
        result
    }
}

#[async_trait]
impl ShardChannel for HttpShardChannel {
    fn source_url(&self, file_key: &str) -> String {
        format!("{}/{}", self.base_url, file_key.trim_start_matches('/'))
    }

    async fn patch_metadata(&self, item: &WorkItem, thumbnail: &Path) -> ClientResult<()> {
        let file_key = item
            .storage_key()
            .ok_or_else(|| ClientError::invalid_work_item("work item has no file key"))?;

        let form = Form::new().text("fileItem", Self::item_json(item)?).part(
            "file",
            Self::file_part(thumbnail, thumbnail_file_name(file_key), THUMBNAIL_CONTENT_TYPE)
                .await?,
        );

        self.post_form(METADATA_PATCH_PATH, form).await?;
        debug!(work_item_id = %item.id, "Uploaded metadata and thumbnail");
        Ok(())
    }

    async fn create_preview(
        &self,
        item: &WorkItem,
        tier: QualityTier,
        derivative: &Path,
    ) -> ClientResult<()> {
        if item.storage_key().is_none() {
            return Err(ClientError::invalid_work_item("work item has no file key"));
        }

        let form = Form::new()
            .text("fileItem", Self::item_json(item)?)
            .text("quality", tier.label())
            .part(
                "file",
                Self::file_part(
                    derivative,
                    preview_file_name(item, tier),
                    item.kind().derivative_content_type(),
                )
                .await?,
            );

        self.post_form(PREVIEW_CREATE_PATH, form).await?;
        debug!(work_item_id = %item.id, tier = %tier, "Uploaded preview");
        Ok(())
    }
}
