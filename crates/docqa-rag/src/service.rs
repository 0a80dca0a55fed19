//! Wiring from [`Settings`] to ready-to-use pipelines.

use std::path::Path;
use std::sync::Arc;

use docqa_core::config::Settings;
use docqa_core::error::Result;
use docqa_core::loader::FsLoader;
use docqa_core::types::{Answer, RetrievalOutcome};
use docqa_embed::{default_provider, Embedder};
use docqa_vector::CorpusStore;

use crate::answer::Synthesizer;
use crate::chat::OpenAiChat;
use crate::ingest::Ingestor;
use crate::retrieve::Retriever;

fn embedder(settings: &Settings) -> Result<Embedder> {
    let provider = default_provider(&settings.embedding)?;
    Ok(Embedder::from_settings(provider, &settings.embedding))
}

/// Ingestor reading the filesystem loader and writing under `data.storage_dir`.
pub fn build_ingestor(settings: &Settings, base: &Path) -> Result<Ingestor> {
    settings.validate()?;
    Ok(Ingestor::new(
        Arc::new(FsLoader::new()),
        embedder(settings)?,
        CorpusStore::new(settings.storage_dir(base)),
        settings.chunking,
    ))
}

pub fn build_retriever(settings: &Settings, base: &Path) -> Result<Retriever> {
    settings.validate()?;
    let retriever =
        Retriever::new(embedder(settings)?, CorpusStore::new(settings.storage_dir(base)));
    Ok(if settings.retrieval.cache { retriever } else { retriever.without_cache() })
}

/// Retrieval followed by synthesis: the question-answering use case.
pub struct QaService {
    retriever: Retriever,
    synthesizer: Synthesizer,
    default_top_k: usize,
}

impl QaService {
    pub fn new(retriever: Retriever, synthesizer: Synthesizer, default_top_k: usize) -> Self {
        Self { retriever, synthesizer, default_top_k }
    }

    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        let retriever = build_retriever(settings, base)?;
        let chat = Arc::new(OpenAiChat::new(&settings.generation)?);
        let synthesizer = Synthesizer::from_settings(chat, &settings.generation);
        Ok(Self::new(retriever, synthesizer, settings.retrieval.default_top_k))
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn retrieve(&self, question: &str, top_k: Option<usize>) -> Result<RetrievalOutcome> {
        self.retriever.retrieve(question, top_k.unwrap_or(self.default_top_k)).await
    }

    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        let outcome = self.retrieve(question, top_k).await?;
        if outcome.is_empty() {
            tracing::info!("no context retrieved; answering with the fixed fallback");
        }
        self.synthesizer.answer(question, outcome).await
    }
}
