//! Work items handed out by the coordinator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::file_ptr::ExtractedMetadata;
use crate::media_kind::MediaKind;
use crate::tier::ResolutionLadder;

/// Stable identifier of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub String);

impl WorkItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A storage node hosting original files and receiving derivatives.
///
/// Only `domain` is used by the worker. Liveness, pairing, capacity and
/// heartbeat fields stay in `extra` exactly as the coordinator sent them, so
/// a `null` flag or a string-encoded counter never rejects the work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageShard {
    pub domain: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StorageShard {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            extra: Map::new(),
        }
    }
}

/// One file-processing job unit.
///
/// Fields the worker does not interpret are kept in `extra` and serialized
/// back verbatim when the item is uploaded as shard metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: WorkItemId,
    #[serde(default)]
    pub file_key: Option<String>,
    #[serde(default)]
    pub file_type: Option<MediaKind>,
    #[serde(default)]
    pub item_width: Option<u32>,
    #[serde(default)]
    pub item_height: Option<u32>,
    #[serde(default)]
    pub is_private: Option<bool>,
    #[serde(default)]
    pub preview_blur_hash: Option<String>,
    #[serde(default)]
    pub server_shard: Option<StorageShard>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkItem {
    /// Create a minimal work item (mostly useful for tests and tooling).
    pub fn new(id: impl Into<String>, file_key: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: WorkItemId::new(id),
            file_key: Some(file_key.into()),
            file_type: Some(kind),
            item_width: None,
            item_height: None,
            is_private: None,
            preview_blur_hash: None,
            server_shard: None,
            extra: Map::new(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.item_width = Some(width);
        self.item_height = Some(height);
        self
    }

    pub fn with_shard(mut self, shard: StorageShard) -> Self {
        self.server_shard = Some(shard);
        self
    }

    /// Declared media kind, `Other` when missing.
    pub fn kind(&self) -> MediaKind {
        self.file_type.unwrap_or_default()
    }

    /// Domain of the owning shard, if any.
    pub fn shard_domain(&self) -> Option<&str> {
        self.server_shard
            .as_ref()
            .map(|s| s.domain.as_str())
            .filter(|d| !d.is_empty())
    }

    /// Storage key, if present and non-empty.
    pub fn storage_key(&self) -> Option<&str> {
        self.file_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Input to the resolution ladder for this item.
    pub fn ladder_height(&self) -> u32 {
        ResolutionLadder::ladder_input(self.item_width, self.item_height)
    }

    /// Fold metadata extracted by the thumbnail step into the item.
    ///
    /// Zero dimensions are treated as "not extracted" and leave the declared
    /// values untouched.
    pub fn apply_extracted(&mut self, meta: &ExtractedMetadata) {
        if meta.width > 0 && meta.height > 0 {
            self.item_width = Some(meta.width);
            self.item_height = Some(meta.height);
        }
        if let Some(hash) = &meta.preview_hash {
            self.preview_blur_hash = Some(hash.clone());
        }
    }

    /// Copy of the item as sent to the shard: `isPrivate` coerced to a bool.
    pub fn normalized(&self) -> Self {
        let mut item = self.clone();
        item.is_private = Some(self.is_private.unwrap_or(false));
        item
    }
}
