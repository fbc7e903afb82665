//! Image download over HTTP.

use super::{status_error, ImageSource};
use crate::error::ResolverError;
use async_trait::async_trait;
use tracing::debug;

/// Fetches image URLs with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpImageSource {
    /// `client` should already carry the download timeout; `timeout_secs`
    /// is only used to report it.
    pub fn new(client: reqwest::Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout_secs,
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResolverError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolverError::from_reqwest(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResolverError::from_reqwest(e, self.timeout_secs))?;
        debug!("Fetched image {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let source = HttpImageSource::new(client, 2);
        // Port 9 on localhost refuses connections
        let err = source.fetch("http://127.0.0.1:9/x.png").await.unwrap_err();
        assert!(matches!(
            err,
            ResolverError::Transport(_) | ResolverError::Timeout { .. }
        ));
    }
}
