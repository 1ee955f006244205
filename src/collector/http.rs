use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::UploadConfig;
use crate::models::UploadBatch;

use super::Collector;

/// Posts batches as JSON to a fixed endpoint with a static token header.
pub struct HttpCollector {
    client: Client,
    endpoint: String,
    token_header: String,
    token: String,
}

impl HttpCollector {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build upload client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token_header: config.token_header.clone(),
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn upload(&self, batch: &UploadBatch) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(batch);
        if !self.token.is_empty() {
            request = request.header(self.token_header.as_str(), self.token.as_str());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("upload to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "collector rejected batch for session {}: HTTP {status}",
                batch.session_id
            ));
        }

        debug!(
            "uploaded {} frames / {} events for session {}",
            batch.frames.len(),
            batch.event_count(),
            batch.session_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_config() {
        let config = UploadConfig {
            endpoint: "http://127.0.0.1:9/upload".into(),
            ..UploadConfig::default()
        };
        let collector = HttpCollector::new(&config).unwrap();
        assert_eq!(collector.endpoint(), "http://127.0.0.1:9/upload");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let config = UploadConfig {
            endpoint: "http://127.0.0.1:9/upload".into(),
            timeout_ms: 500,
            ..UploadConfig::default()
        };
        let collector = HttpCollector::new(&config).unwrap();
        let batch = UploadBatch::new(
            "s1".into(),
            &crate::models::SessionIdentity {
                user_id: "u".into(),
                device: "d".into(),
                app_version: "1".into(),
            },
        );
        assert!(collector.upload(&batch).await.is_err());
    }
}
