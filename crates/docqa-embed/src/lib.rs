//! Embedding client adapter: fixed-size batching over an [`EmbeddingProvider`].
//!
//! Batches may be dispatched concurrently (bounded by `max_in_flight`) but the
//! returned vectors are always in input order, and any failed batch aborts the
//! whole call with no partial result.

use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use indicatif::ProgressBar;

use docqa_core::config::EmbeddingSettings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::EmbeddingProvider;

pub mod fake;
pub mod openai;
pub mod retry;

pub use fake::FakeEmbeddings;
pub use openai::OpenAiEmbeddings;
pub use retry::Retrying;

pub const DEFAULT_BATCH_SIZE: usize = 96;

#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_in_flight: usize,
    timeout: Option<Duration>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider, batch_size: DEFAULT_BATCH_SIZE, max_in_flight: 1, timeout: None }
    }

    pub fn from_settings(
        provider: Arc<dyn EmbeddingProvider>,
        settings: &EmbeddingSettings,
    ) -> Self {
        Self::new(provider)
            .with_batch_size(settings.batch_size)
            .with_max_in_flight(settings.max_in_flight)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Per-batch deadline. A batch that misses it fails the whole call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn embedder_id(&self) -> &str {
        self.provider.embedder_id()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_progress(texts, &ProgressBar::hidden()).await
    }

    /// Embed `texts` in order, advancing `progress` by one per embedded text.
    pub async fn embed_with_progress(
        &self,
        texts: &[String],
        progress: &ProgressBar,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // Collected eagerly: a `map` inside the stream is not general over the batch lifetime.
        let calls: Vec<_> = texts
            .chunks(self.batch_size)
            .enumerate()
            .map(|(batch_no, batch)| self.embed_batch(batch_no, batch, progress))
            .collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(calls)
            .buffered(self.max_in_flight)
            .try_collect()
            .await?;
        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

        let dim = vectors.first().map_or(0, Vec::len);
        if dim == 0 {
            return Err(Error::Provider(format!("{} returned empty vectors", self.embedder_id())));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::Provider(format!(
                "{} returned mixed dimensions: {} and {}",
                self.embedder_id(),
                dim,
                bad.len()
            )));
        }
        Ok(vectors)
    }

    /// Embed a single text, e.g. a query.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::Provider("provider returned no vector".into()))
    }

    async fn embed_batch(
        &self,
        batch_no: usize,
        batch: &[String],
        progress: &ProgressBar,
    ) -> Result<Vec<Vec<f32>>> {
        let call = self.provider.embed_batch(batch);
        let vectors = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit.as_secs()))??,
            None => call.await?,
        };
        if vectors.len() != batch.len() {
            return Err(Error::Provider(format!(
                "batch {batch_no}: expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        tracing::debug!(batch_no, size = batch.len(), "embedded batch");
        progress.inc(batch.len() as u64);
        Ok(vectors)
    }
}

/// Pick the embedding provider for these settings.
///
/// Respects `APP_USE_FAKE_EMBEDDINGS=1` to switch to [`FakeEmbeddings`] for
/// fast, deterministic, offline runs.
pub fn default_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let base: Arc<dyn EmbeddingProvider> = if use_fake {
        tracing::info!("using fake embeddings");
        Arc::new(FakeEmbeddings::new(fake::DEFAULT_DIM))
    } else {
        Arc::new(OpenAiEmbeddings::new(settings)?)
    };
    if settings.max_retries == 0 {
        return Ok(base);
    }
    Ok(Arc::new(Retrying::new(base, settings.max_retries)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Encodes each text's numeric value into a 2-d vector and records batch sizes.
    struct Recording {
        batches: Mutex<Vec<usize>>,
        fail_on_batch: Option<usize>,
        calls: AtomicUsize,
        delay_first: bool,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail_on_batch: None,
                calls: AtomicUsize::new(0),
                delay_first: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Recording {
        fn embedder_id(&self) -> &str {
            "recording"
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(texts.len());
            if self.fail_on_batch == Some(call) {
                return Err(Error::Provider("boom".into()));
            }
            if self.delay_first && call == 0 {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            Ok(texts.iter().map(|t| vec![t.parse::<f32>().unwrap(), 1.0]).collect())
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[tokio::test]
    async fn batches_are_invisible_to_callers() {
        let provider = Arc::new(Recording::new());
        let embedder = Embedder::new(provider.clone());
        let vectors = embedder.embed(&numbered(200)).await.unwrap();
        assert_eq!(vectors.len(), 200);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], i as f32);
        }
        assert_eq!(*provider.batches.lock().unwrap(), vec![96, 96, 8]);
    }

    #[tokio::test]
    async fn concurrent_batches_reassemble_in_order() {
        let provider = Arc::new(Recording { delay_first: true, ..Recording::new() });
        let embedder = Embedder::new(provider).with_batch_size(3).with_max_in_flight(4);
        let vectors = embedder.embed(&numbered(10)).await.unwrap();
        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn any_failed_batch_aborts_everything() {
        let provider = Arc::new(Recording { fail_on_batch: Some(1), ..Recording::new() });
        let embedder = Embedder::new(provider).with_batch_size(2);
        let err = embedder.embed(&numbered(6)).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let provider = Arc::new(Recording::new());
        let embedder = Embedder::new(provider.clone());
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    struct Short;

    #[async_trait]
    impl EmbeddingProvider for Short {
        fn embedder_id(&self) -> &str {
            "short"
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn count_mismatch_is_a_provider_error() {
        let embedder = Embedder::new(Arc::new(Short));
        let err = embedder.embed(&numbered(3)).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    struct Slow;

    #[async_trait]
    impl EmbeddingProvider for Slow {
        fn embedder_id(&self) -> &str {
            "slow"
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let embedder = Embedder::new(Arc::new(Slow)).with_timeout(Duration::from_millis(20));
        let err = embedder.embed_one("q").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
