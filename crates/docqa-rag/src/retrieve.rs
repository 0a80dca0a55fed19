//! Retrieval pipeline: embed the question, search, hydrate, rank.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use docqa_core::error::{Error, Result};
use docqa_core::types::{RetrievalOutcome, RetrievalResult};
use docqa_embed::Embedder;
use docqa_vector::{l2_normalize, Corpus, CorpusStore};

/// A corpus as loaded from one published generation.
struct Loaded {
    generation: String,
    corpus: Corpus,
}

/// Answers queries against whatever generation the store currently publishes.
///
/// With caching on, the loaded corpus is reused until the store's `CURRENT`
/// pointer names a different generation, so a re-ingestion is picked up on
/// the next query.
pub struct Retriever {
    embedder: Embedder,
    store: CorpusStore,
    cache: Option<ArcSwapOption<Loaded>>,
}

impl Retriever {
    pub fn new(embedder: Embedder, store: CorpusStore) -> Self {
        Self { embedder, store, cache: Some(ArcSwapOption::empty()) }
    }

    /// Reload the corpus from disk on every query instead of caching it.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<RetrievalOutcome> {
        if top_k == 0 {
            return Err(Error::InvalidRequest("top_k must be a positive integer".into()));
        }
        if question.trim().is_empty() {
            return Err(Error::InvalidRequest("question must not be blank".into()));
        }
        let Some(loaded) = self.current()? else {
            tracing::info!("no corpus has been ingested yet");
            return Ok(RetrievalOutcome::NoContext);
        };
        let corpus = &loaded.corpus;
        if corpus.is_empty() {
            return Ok(RetrievalOutcome::NoContext);
        }

        let mut query = self.embedder.embed_one(question).await?;
        if query.len() != corpus.dim() {
            return Err(Error::DimensionMismatch { expected: corpus.dim(), actual: query.len() });
        }
        if !l2_normalize(&mut query) {
            tracing::warn!("query embedding has zero norm; every score will be 0");
        }

        let neighbors = corpus.index().search(&query, top_k)?;
        let results: Vec<RetrievalResult> = neighbors
            .iter()
            .filter_map(|n| corpus.chunk(n.row).map(|chunk| (n.score, chunk)))
            .enumerate()
            .map(|(i, (score, chunk))| RetrievalResult {
                rank: i + 1,
                score,
                source: chunk.source.clone(),
                chunk_id: chunk.id.clone(),
                text: chunk.text.clone(),
            })
            .collect();
        tracing::debug!(
            generation = %loaded.generation,
            top_k,
            hits = results.len(),
            "retrieved context"
        );
        Ok(RetrievalOutcome::from_results(results))
    }

    fn current(&self) -> Result<Option<Arc<Loaded>>> {
        let Some(generation) = self.store.current_generation()? else {
            if let Some(cache) = &self.cache {
                cache.store(None);
            }
            return Ok(None);
        };
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.load_full().filter(|l| l.generation == generation) {
                return Ok(Some(hit));
            }
        }
        let corpus = self.store.load_generation(&generation)?;
        tracing::info!(generation = %generation, rows = corpus.len(), "loaded corpus");
        let loaded = Arc::new(Loaded { generation, corpus });
        if let Some(cache) = &self.cache {
            cache.store(Some(Arc::clone(&loaded)));
        }
        Ok(Some(loaded))
    }
}
