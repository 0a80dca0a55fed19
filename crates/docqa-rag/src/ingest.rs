//! Ingestion pipeline: collect, chunk, embed, build, persist.
//!
//! Runs linearly and rebuilds the corpus from scratch every time. Nothing is
//! written unless every stage succeeds, and the published pair is swapped in
//! as a whole by [`CorpusStore::replace`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;

use docqa_core::chunker::{chunk_documents, ChunkingConfig};
use docqa_core::error::{Error, Result};
use docqa_core::traits::DocumentLoader;
use docqa_core::types::Document;
use docqa_embed::Embedder;
use docqa_vector::{Corpus, CorpusStore, FlatIndex};

/// Summary of one successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dim: usize,
    pub generation: String,
    pub embedder_id: String,
}

pub struct Ingestor {
    loader: Arc<dyn DocumentLoader>,
    embedder: Embedder,
    store: CorpusStore,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Embedder,
        store: CorpusStore,
        chunking: ChunkingConfig,
    ) -> Self {
        Self { loader, embedder, store, chunking }
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub async fn run(&self, folder: &Path) -> Result<IngestReport> {
        self.run_with_progress(folder, &ProgressBar::hidden()).await
    }

    /// Same as [`Ingestor::run`], reporting embedding progress per chunk on `progress`.
    pub async fn run_with_progress(
        &self,
        folder: &Path,
        progress: &ProgressBar,
    ) -> Result<IngestReport> {
        self.chunking.validate()?;

        let documents = self.collect_documents(folder).await?;
        tracing::info!(
            folder = %folder.display(),
            documents = documents.len(),
            "collected documents"
        );

        let chunks = chunk_documents(&documents, &self.chunking)?;
        if chunks.is_empty() {
            return Err(Error::NoContent(format!(
                "no documents with extractable text found in {}",
                folder.display()
            )));
        }
        tracing::info!(
            chunks = chunks.len(),
            chunk_size = self.chunking.chunk_size,
            overlap = self.chunking.overlap,
            "chunked documents"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        progress.set_length(texts.len() as u64);
        let vectors = self.embedder.embed_with_progress(&texts, progress).await?;
        tracing::info!(
            vectors = vectors.len(),
            embedder = self.embedder.embedder_id(),
            "embedded chunks"
        );

        let index = FlatIndex::build(vectors)?;
        let dim = index.dim();
        let chunk_count = chunks.len();
        let corpus = Corpus::new(index, chunks)?;
        let generation = self.store.replace(&corpus)?;

        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunk_count,
            dim,
            generation,
            embedder_id: self.embedder.embedder_id().to_string(),
        })
    }

    async fn collect_documents(&self, folder: &Path) -> Result<Vec<Document>> {
        let loader = Arc::clone(&self.loader);
        let folder: PathBuf = folder.to_path_buf();
        tokio::task::spawn_blocking(move || loader.load(&folder))
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!("document loader task failed: {e}")))
            })?
    }
}
