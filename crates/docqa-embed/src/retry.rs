use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use docqa_core::error::{ErrorKind, Result};
use docqa_core::traits::EmbeddingProvider;

/// Retries provider-class failures of a single batch with linear backoff.
///
/// Configuration failures (bad key, bad request shape) are returned at once.
pub struct Retrying {
    inner: Arc<dyn EmbeddingProvider>,
    max_retries: usize,
    backoff: Duration,
}

impl Retrying {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_retries: usize) -> Self {
        Self { inner, max_retries, backoff: Duration::from_millis(500) }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for Retrying {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0usize;
        loop {
            match self.inner.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.kind() == ErrorKind::Provider && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        "retrying embedding batch"
                    );
                    tokio::time::sleep(self.backoff * attempt as u32).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
