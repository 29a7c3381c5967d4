//! Artifacts downloaded over HTTP

use super::ArtifactSource;
use crate::error::FetchError;

/// Downloads artifacts; the artifact path is the full URL
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!("Downloading artifact {}", path);
        let response = self.client.get(path).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
