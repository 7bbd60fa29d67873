//! Temporary file lifecycle.
//!
//! Every local file a job creates is registered with the [`ResourceTracker`]
//! before anything is written to it. A registered path is deleted exactly
//! once: on explicit release, when its job scope closes, or by
//! [`ResourceTracker::drain_all`] at shutdown, whichever comes first.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use prevgen_models::{LocalFilePointer, WorkItem};

use crate::fs::{Filesystem, TokioFilesystem};
use crate::metrics::{record_cleanup_failure, set_tracked_files};

/// Registry of temporary files pending deletion.
pub struct ResourceTracker {
    work_dir: PathBuf,
    fs: Arc<dyn Filesystem>,
    /// Path -> owning scope (`None` for pointers tracked outside a scope)
    pending: Mutex<HashMap<PathBuf, Option<Uuid>>>,
}

impl ResourceTracker {
    pub fn new(work_dir: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            work_dir: work_dir.into(),
            fs,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Tracker deleting through `tokio::fs`.
    pub fn with_tokio_fs(work_dir: impl Into<PathBuf>) -> Self {
        Self::new(work_dir, Arc::new(TokioFilesystem))
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Create the work directory if it does not exist yet.
    pub async fn ensure_work_dir(&self) -> io::Result<()> {
        self.fs.create_dir_all(&self.work_dir).await
    }

    /// Open a job scope on this tracker.
    pub fn scope(self: &Arc<Self>) -> JobScope {
        JobScope {
            tracker: Arc::clone(self),
            id: Uuid::new_v4(),
            closed: false,
        }
    }

    /// Register `pointer` for eventual deletion.
    pub fn track(&self, pointer: &LocalFilePointer) {
        self.register(pointer.path(), None);
    }

    /// Delete `pointer` now and stop tracking it.
    ///
    /// Returns `false` without touching the filesystem if the pointer is not
    /// (or no longer) tracked.
    pub async fn release(&self, pointer: &LocalFilePointer) -> bool {
        self.release_path(pointer.path()).await
    }

    pub async fn release_path(&self, path: &Path) -> bool {
        let removed = {
            let mut pending = self.lock();
            let removed = pending.remove(path).is_some();
            set_tracked_files(pending.len());
            removed
        };

        if removed {
            self.delete(path).await;
        }
        removed
    }

    /// Delete every tracked file. Returns how many deletions were attempted.
    pub async fn drain_all(&self) -> usize {
        let paths: Vec<PathBuf> = {
            let mut pending = self.lock();
            let paths = pending.drain().map(|(path, _)| path).collect();
            set_tracked_files(0);
            paths
        };

        for path in &paths {
            self.delete(path).await;
        }
        if !paths.is_empty() {
            debug!(count = paths.len(), "Drained tracked files");
        }
        paths.len()
    }

    /// Number of tracked files.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn register(&self, path: &Path, scope: Option<Uuid>) {
        let mut pending = self.lock();
        pending.insert(path.to_path_buf(), scope);
        set_tracked_files(pending.len());
    }

    async fn release_scope(&self, scope: Uuid) -> usize {
        let paths: Vec<PathBuf> = {
            let mut pending = self.lock();
            let paths: Vec<PathBuf> = pending
                .iter()
                .filter(|(_, owner)| **owner == Some(scope))
                .map(|(path, _)| path.clone())
                .collect();
            for path in &paths {
                pending.remove(path);
            }
            set_tracked_files(pending.len());
            paths
        };

        for path in &paths {
            self.delete(path).await;
        }
        paths.len()
    }

    /// Best-effort delete; failures are logged and swallowed.
    async fn delete(&self, path: &Path) {
        match self.fs.remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Deleted temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Temporary file was never created")
            }
            Err(e) => {
                record_cleanup_failure();
                warn!(path = %path.display(), error = %e, "Failed to delete temporary file");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Option<Uuid>>> {
        // The map stays consistent even if a holder panicked
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The set of temporary files belonging to one pipeline run.
///
/// Call [`JobScope::close`] when the job ends. A scope dropped without being
/// closed (a panicking job) releases its files from a spawned task.
pub struct JobScope {
    tracker: Arc<ResourceTracker>,
    id: Uuid,
    closed: bool,
}

impl JobScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// New tracked pointer for the item's source download.
    ///
    /// Named `transcoding-file-<unix millis>-<32 hex>.<ext>` inside the work
    /// directory, so concurrent jobs never collide.
    pub fn allocate_source(&self, item: Arc<WorkItem>) -> LocalFilePointer {
        let ext = source_extension(item.file_key.as_deref().unwrap_or_default());
        let name = format!(
            "transcoding-file-{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        let pointer = LocalFilePointer::new(self.tracker.work_dir.join(name), item);
        self.track(&pointer);
        pointer
    }

    /// New tracked pointer next to `parent`, named by appending `suffix`.
    pub fn derive(&self, parent: &LocalFilePointer, suffix: &str) -> LocalFilePointer {
        let pointer = parent.derive(suffix);
        self.track(&pointer);
        pointer
    }

    pub fn track(&self, pointer: &LocalFilePointer) {
        self.tracker.register(pointer.path(), Some(self.id));
    }

    pub async fn release(&self, pointer: &LocalFilePointer) -> bool {
        self.tracker.release(pointer).await
    }

    /// Release everything still registered to this scope.
    ///
    /// Returns how many files were left over.
    pub async fn close(mut self) -> usize {
        self.closed = true;
        self.tracker.release_scope(self.id).await
    }
}

impl Drop for JobScope {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let tracker = Arc::clone(&self.tracker);
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(scope = %id, "Job scope dropped without close(), releasing its files");
                handle.spawn(async move {
                    tracker.release_scope(id).await;
                });
            }
            Err(_) => {
                warn!(
                    scope = %id,
                    "Job scope dropped outside a runtime, files stay tracked until drain"
                );
            }
        }
    }
}

/// Extension of the object named by `file_key`, or `tmp`.
fn source_extension(file_key: &str) -> String {
    let name = file_key.split('?').next().unwrap_or_default();
    let name = name.rsplit('/').next().unwrap_or_default();

    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "tmp".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFilesystem;
    use mockall::predicate::always;
    use prevgen_models::MediaKind;

    fn item(key: &str) -> Arc<WorkItem> {
        Arc::new(WorkItem::new("id-1", key, MediaKind::Video))
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension("u/clip.MP4"), "mp4");
        assert_eq!(source_extension("u/clip.mov?sig=abc.def"), "mov");
        assert_eq!(source_extension("u/noext"), "tmp");
        assert_eq!(source_extension("u.dir/noext"), "tmp");
        assert_eq!(source_extension(".hidden"), "tmp");
        assert_eq!(source_extension(""), "tmp");
    }

    #[tokio::test]
    async fn test_release_deletes_exactly_once() {
        let mut fs = MockFilesystem::new();
        fs.expect_remove_file().with(always()).times(1).returning(|_| Ok(()));
        let tracker = Arc::new(ResourceTracker::new("/work", Arc::new(fs)));

        let scope = tracker.scope();
        let source = scope.allocate_source(item("u/clip.mp4"));
        assert!(tracker.is_tracked(source.path()));

        assert!(scope.release(&source).await);
        assert!(!scope.release(&source).await);
        assert_eq!(scope.close().await, 0);
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test]
    async fn test_source_names_are_unique() {
        let mut fs = MockFilesystem::new();
        fs.expect_remove_file().times(2).returning(|_| Ok(()));
        let tracker = Arc::new(ResourceTracker::new("/work", Arc::new(fs)));
        let scope = tracker.scope();
        let a = scope.allocate_source(item("u/clip.mp4"));
        let b = scope.allocate_source(item("u/clip.mp4"));

        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with("/work"));
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("transcoding-file-"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(scope.close().await, 2);
    }

    #[tokio::test]
    async fn test_close_releases_leftovers_and_swallows_errors() {
        let mut fs = MockFilesystem::new();
        fs.expect_remove_file()
            .times(2)
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope")));
        let tracker = Arc::new(ResourceTracker::new("/work", Arc::new(fs)));

        let scope = tracker.scope();
        let source = scope.allocate_source(item("u/a.jpg"));
        scope.derive(&source, "__thumbnail__.jpg");

        assert_eq!(scope.close().await, 2);
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test]
    async fn test_close_leaves_other_scopes_alone() {
        let mut fs = MockFilesystem::new();
        fs.expect_remove_file().times(2).returning(|_| Ok(()));
        let tracker = Arc::new(ResourceTracker::new("/work", Arc::new(fs)));

        let first = tracker.scope();
        let second = tracker.scope();
        first.allocate_source(item("u/a.jpg"));
        let kept = second.allocate_source(item("u/b.jpg"));

        assert_eq!(first.close().await, 1);
        assert!(tracker.is_tracked(kept.path()));
        assert_eq!(second.close().await, 1);
    }

    #[tokio::test]
    async fn test_drain_all() {
        let mut fs = MockFilesystem::new();
        fs.expect_remove_file().times(3).returning(|_| Ok(()));
        let tracker = Arc::new(ResourceTracker::new("/work", Arc::new(fs)));

        let scope = tracker.scope();
        let source = scope.allocate_source(item("u/a.jpg"));
        scope.derive(&source, "_480p.jpeg");
        tracker.track(&LocalFilePointer::new("/work/loose", item("u/a.jpg")));

        assert_eq!(tracker.drain_all().await, 3);
        assert_eq!(tracker.pending(), 0);
        // Already drained: closing must not delete again
        assert_eq!(scope.close().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_scope_releases_in_background() {
        let mut fs = MockFilesystem::new();
        fs.expect_remove_file().times(1).returning(|_| Ok(()));
        let tracker = Arc::new(ResourceTracker::new("/work", Arc::new(fs)));

        {
            let scope = tracker.scope();
            scope.allocate_source(item("u/a.jpg"));
        }

        for _ in 0..50 {
            if tracker.pending() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(tracker.pending(), 0);
    }
}
