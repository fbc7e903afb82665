//! TextIn layout extraction: PDF bytes in, block list out.

use super::LayoutExtractor;
use crate::config::TextInConfig;
use crate::error::Pdf2DocxError;
use crate::pipeline::blocks::{parse_extraction, ContentBlock};
use async_trait::async_trait;
use tracing::{debug, info};

const APP_ID_HEADER: &str = "x-ti-app-id";
const SECRET_HEADER: &str = "x-ti-secret-code";

/// Calls the TextIn `pdf_to_markdown` endpoint with image objects enabled.
#[derive(Debug, Clone)]
pub struct TextInExtractor {
    client: reqwest::Client,
    config: TextInConfig,
    timeout_secs: u64,
}

impl TextInExtractor {
    pub fn new(client: reqwest::Client, config: TextInConfig, timeout_secs: u64) -> Self {
        Self {
            client,
            config,
            timeout_secs,
        }
    }

    fn failed(&self, detail: impl Into<String>) -> Pdf2DocxError {
        Pdf2DocxError::ExtractionFailed {
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl LayoutExtractor for TextInExtractor {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<ContentBlock>, Pdf2DocxError> {
        debug!("TextIn request: {} bytes to {}", pdf.len(), self.config.endpoint);

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("get_image", "objects")])
            .header(APP_ID_HEADER, &self.config.app_id)
            .header(SECRET_HEADER, &self.config.secret_code)
            .body(pdf.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.failed(format!("timed out after {}s", self.timeout_secs))
                } else {
                    self.failed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.failed(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(self.failed(format!("HTTP {status}")));
        }

        let blocks = parse_extraction(&body)?;
        info!("TextIn extracted {} blocks", blocks.len());
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_extraction_failure() {
        let mut config = TextInConfig::new("id", "secret");
        config.endpoint = "http://127.0.0.1:9/pdf_to_markdown".into();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let extractor = TextInExtractor::new(client, config, 2);
        let err = extractor.extract(b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, Pdf2DocxError::ExtractionFailed { .. }));
    }
}
