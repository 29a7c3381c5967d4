//! Artifacts read from disk

use std::path::PathBuf;

use super::ArtifactSource;
use crate::error::FetchError;

/// Reads artifacts relative to a root directory
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve paths against the process working directory
    pub fn current_dir() -> Self {
        Self::new(".")
    }
}

impl ArtifactSource for FileSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.root.join(path);
        tracing::debug!("Reading artifact {}", full.display());
        tokio::fs::read(&full).await.map_err(|source| FetchError::Io {
            path: full.display().to_string(),
            source,
        })
    }
}
