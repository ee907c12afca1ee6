//! Transient Store
//!
//! The process-wide scratch directory. Created once at startup and shared by
//! every request through [`crate::state::AppState`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::StoreError;

/// Scratch directory handle
#[derive(Clone)]
pub struct TransientStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: PathBuf,
    /// Present when the directory is ours to delete on shutdown
    _owned: Option<TempDir>,
}

impl TransientStore {
    /// Create a fresh temporary scratch directory, removed when the last
    /// handle is dropped
    pub fn temporary() -> Result<Self, StoreError> {
        let dir = tempfile::Builder::new()
            .prefix("docshift-")
            .tempdir()
            .map_err(|e| StoreError::io(std::env::temp_dir(), e))?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                root: dir.path().to_path_buf(),
                _owned: Some(dir),
            }),
        })
    }

    /// Use a configured directory, creating it if needed. It is never removed.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        Ok(Self {
            inner: Arc::new(StoreInner { root, _owned: None }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Path for `file_name` inside the scratch directory.
    ///
    /// `file_name` must already be sanitized; the file is not created.
    pub fn reserve(&self, file_name: &str) -> PathBuf {
        self.inner.root.join(file_name)
    }

    /// Write upload bytes to `path`
    pub async fn persist(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| StoreError::io(path, e))?;

        tracing::debug!(path = %path.display(), size = data.len(), "Persisted upload");
        Ok(())
    }

    /// Check a persisted file exists and is non-empty, returning its size
    pub async fn verify(&self, path: &Path) -> Result<u64, StoreError> {
        let size = self.size_of(path).await?;
        if size == 0 {
            return Err(StoreError::EmptyFile(path.to_path_buf()));
        }
        Ok(size)
    }

    /// Size of a file in the store
    pub async fn size_of(&self, path: &Path) -> Result<u64, StoreError> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::MissingFile(path.to_path_buf()))
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Read a finished output back into memory
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::MissingFile(path.to_path_buf()))
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Delete every path, logging failures instead of returning them.
    ///
    /// Already-missing files are skipped silently, so calling this twice on
    /// the same paths is harmless. Returns how many files were removed.
    pub async fn remove_all<P: AsRef<Path>>(&self, paths: &[P]) -> usize {
        let mut removed = 0;
        for path in paths {
            let path: &Path = path.as_ref();
            if removal_logged(path, tokio::fs::remove_file(path).await) {
                removed += 1;
            }
        }
        removed
    }

    /// [`remove_all`](Self::remove_all) for contexts that cannot await, i.e. `Drop`
    pub fn remove_all_blocking<P: AsRef<Path>>(&self, paths: &[P]) -> usize {
        paths
            .iter()
            .filter(|path| {
                let path: &Path = path.as_ref();
                removal_logged(path, std::fs::remove_file(path))
            })
            .count()
    }
}

fn removal_logged(path: &Path, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed temporary file");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
            false
        }
    }
}
