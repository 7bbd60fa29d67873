//! Local file pointers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::work_item::WorkItem;

/// Metadata extracted while generating a thumbnail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Source width in pixels (0 when unknown)
    pub width: u32,
    /// Source height in pixels (0 when unknown)
    pub height: u32,
    /// Compact perceptual preview string (blurhash)
    pub preview_hash: Option<String>,
}

/// A local temporary file derived from a work item.
///
/// Pointers are cheap to clone; the work item is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFilePointer {
    path: PathBuf,
    item: Arc<WorkItem>,
    metadata: Option<ExtractedMetadata>,
}

impl LocalFilePointer {
    pub fn new(path: impl Into<PathBuf>, item: Arc<WorkItem>) -> Self {
        Self {
            path: path.into(),
            item,
            metadata: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    pub fn shared_item(&self) -> Arc<WorkItem> {
        Arc::clone(&self.item)
    }

    pub fn metadata(&self) -> Option<&ExtractedMetadata> {
        self.metadata.as_ref()
    }

    pub fn with_metadata(mut self, metadata: ExtractedMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sibling path built by appending `suffix` to this pointer's file name.
    pub fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// New pointer for the same work item at a sibling path.
    pub fn derive(&self, suffix: &str) -> Self {
        Self::new(self.sibling_path(suffix), self.shared_item())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaKind;

    #[test]
    fn test_derive_appends_suffix() {
        let item = Arc::new(WorkItem::new("a", "k.mp4", MediaKind::Video));
        let source = LocalFilePointer::new("/tmp/work/transcoding-file-1-ab.mp4", item);
        let thumb = source.derive("__thumbnail__.jpg");
        assert_eq!(
            thumb.path(),
            Path::new("/tmp/work/transcoding-file-1-ab.mp4__thumbnail__.jpg")
        );
        assert_eq!(thumb.item().id, source.item().id);
        assert!(thumb.metadata().is_none());
    }
}
