use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Sliding-window parameters, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 800, overlap: 120 }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, overlap };
        config.validate()?;
        Ok(config)
    }

    /// `0 < overlap < chunk_size`; anything else makes the window stall.
    pub fn validate(&self) -> Result<()> {
        if self.overlap == 0 || self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking requires 0 < overlap < chunk_size (got chunk_size={}, overlap={})",
                self.chunk_size, self.overlap
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// Carriage returns become line feeds before windowing. Each window is
/// trimmed; windows that trim to nothing are dropped but still advance.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;
    let text = text.replace('\r', "\n");
    // Byte offset of every char, plus the end, so windows slice on char boundaries.
    let bounds: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < char_len {
        let end = (start + config.chunk_size).min(char_len);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        start += config.stride();
    }
    Ok(chunks)
}

/// Chunk one document, numbering emitted chunks contiguously from zero.
pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    Ok(chunk_text(&doc.text, config)?
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk::new(&doc.source, ordinal, text))
        .collect())
}

/// Chunk every document in order. Ids are unique as long as sources are.
pub fn chunk_documents(docs: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let mut all_chunks = Vec::new();
    for doc in docs {
        let chunks = chunk_document(doc, config)?;
        tracing::debug!(source = %doc.source, chunks = chunks.len(), "chunked document");
        all_chunks.extend(chunks);
    }
    Ok(all_chunks)
}
