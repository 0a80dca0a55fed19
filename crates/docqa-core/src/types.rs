//! Domain types shared by the ingestion and retrieval pipelines.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Raw text of one source file, as produced by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), text: text.into() }
    }
}

/// A segment of a source document that is independently embedded.
///
/// - `id`: `<source>::chunk_<ordinal>`, ordinal counting emitted chunks only
/// - `source`: identifier of the parent document (its file name)
/// - `text`: the trimmed text payload
///
/// Position in the chunk store is the join key against the vector index,
/// not `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub text: String,
}

impl Chunk {
    pub fn new(source: &str, ordinal: usize, text: String) -> Self {
        Self { id: chunk_id(source, ordinal), source: source.to_string(), text }
    }
}

pub fn chunk_id(source: &str, ordinal: usize) -> ChunkId {
    format!("{source}::chunk_{ordinal}")
}

/// A question to answer from the indexed corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub question: String,
    pub top_k: usize,
}

/// One ranked, hydrated context segment. Never persisted.
///
/// `rank` is 1-based in descending score order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub rank: usize,
    pub score: f32,
    pub source: String,
    pub chunk_id: ChunkId,
    pub text: String,
}

/// What retrieval produced. Zero matches is a valid outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Context(Vec<RetrievalResult>),
    NoContext,
}

impl RetrievalOutcome {
    pub fn from_results(results: Vec<RetrievalResult>) -> Self {
        if results.is_empty() { Self::NoContext } else { Self::Context(results) }
    }

    pub fn contexts(&self) -> &[RetrievalResult] {
        match self {
            Self::Context(results) => results,
            Self::NoContext => &[],
        }
    }

    pub fn into_contexts(self) -> Vec<RetrievalResult> {
        match self {
            Self::Context(results) => results,
            Self::NoContext => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoContext)
    }
}

/// A synthesized answer together with the contexts it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub contexts: Vec<RetrievalResult>,
}

/// Request sent to a text-generation provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}
