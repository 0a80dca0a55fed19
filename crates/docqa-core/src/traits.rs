use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CompletionRequest, Document};

/// Produces the ordered document sequence for one ingestion run.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, folder: &Path) -> Result<Vec<Document>>;
}

/// External embedding model. One call is one provider request.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small`).
    fn embedder_id(&self) -> &str;
    /// `result[i]` embeds `texts[i]`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// External text-generation model.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
