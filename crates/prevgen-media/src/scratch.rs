//! Intermediate files created by a single tool invocation.

use std::path::PathBuf;

use tracing::{debug, warn};

/// Removes its paths when dropped.
///
/// Held across the FFmpeg calls that produce the files, so a call that is
/// cancelled mid-flight (its future dropped by a timeout or an aborted task)
/// leaves nothing behind, same as one that completes.
#[derive(Debug)]
pub struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        // Synchronous: a cancelled future gets no further chance to await
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed intermediate file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not delete intermediate file"
                ),
            }
        }
    }
}
