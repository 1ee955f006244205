//! Destinations for upload batches.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::UploadBatch;

mod http;

pub use http::HttpCollector;

/// Accepts a flushed batch. Implementations report success or failure only;
/// the capture engine never retries.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn upload(&self, batch: &UploadBatch) -> Result<()>;
}
