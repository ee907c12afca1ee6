//! Per-request cleanup guard

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::TransientStore;

/// Tracks every scratch file a request creates and deletes them exactly once.
///
/// Paths are registered as soon as they are reserved, before anything is
/// written, so partial outputs are covered as well. [`release`] drains the
/// list; `Drop` removes whatever is left, which covers `?` early returns.
///
/// [`release`]: TempArtifacts::release
pub struct TempArtifacts {
    store: TransientStore,
    paths: Mutex<Vec<PathBuf>>,
}

impl TempArtifacts {
    pub fn new(store: TransientStore) -> Self {
        Self {
            store,
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    /// Reserve `file_name` in the scratch directory and track it
    pub fn reserve(&self, file_name: &str) -> PathBuf {
        let path = self.store.reserve(file_name);
        self.track(path.clone());
        path
    }

    /// Track an already-known path. Duplicates are ignored.
    pub fn track(&self, path: PathBuf) {
        let mut paths = self.paths.lock();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.paths.lock().iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }

    fn take_paths(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.paths.lock())
    }

    /// Delete all tracked files now. Later calls are no-ops.
    pub async fn release(&self) -> usize {
        let paths = self.take_paths();
        if paths.is_empty() {
            return 0;
        }
        let removed = self.store.remove_all(&paths).await;
        tracing::debug!(tracked = paths.len(), removed, "Temporary files cleaned up");
        removed
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        let paths = self.take_paths();
        if !paths.is_empty() {
            let removed = self.store.remove_all_blocking(&paths);
            tracing::debug!(tracked = paths.len(), removed, "Temporary files cleaned up on drop");
        }
    }
}
