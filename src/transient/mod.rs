//! Transient Files
//!
//! Scratch-directory storage for uploads and conversion outputs, plus the
//! per-request guard that guarantees they are deleted.

mod guard;
mod store;

use std::path::{Path, PathBuf};

pub use guard::TempArtifacts;
pub use store::TransientStore;

/// Scratch storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File was not saved: {0}")]
    MissingFile(PathBuf),

    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
