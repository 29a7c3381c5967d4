//! Artifact retrieval
//!
//! A module's artifact path is derived from the public path and its content
//! hash: `{public_path}{hash}.module.wasm`. Sources turn that path into bytes.

mod file;
mod http;

pub use file::FileSource;
pub use http::HttpSource;

use std::future::Future;

use crate::abi::ARTIFACT_SUFFIX;
use crate::error::FetchError;

/// Byte retrieval for module artifacts
pub trait ArtifactSource {
    /// Fetch the raw bytes at `path`
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>>;
}

/// Path of the artifact with content hash `hash`
pub fn artifact_path(public_path: &str, hash: &str) -> String {
    format!("{}{}{}", public_path, hash, ARTIFACT_SUFFIX)
}

/// Source chosen from the configured public path
pub enum AnySource {
    File(FileSource),
    Http(HttpSource),
}

impl AnySource {
    /// HTTP for `http://` and `https://` prefixes, the filesystem otherwise
    pub fn for_public_path(public_path: &str) -> Self {
        if public_path.starts_with("http://") || public_path.starts_with("https://") {
            Self::Http(HttpSource::new())
        } else {
            Self::File(FileSource::current_dir())
        }
    }
}

impl ArtifactSource for AnySource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::File(source) => source.fetch(path).await,
            Self::Http(source) => source.fetch(path).await,
        }
    }
}
