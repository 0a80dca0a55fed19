use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use docqa_core::error::Result;
use docqa_core::traits::EmbeddingProvider;

pub const DEFAULT_DIM: usize = 256;

/// Hashed bag-of-words embeddings: deterministic, offline, L2-normalized.
///
/// Texts sharing words land near each other, which is enough for
/// development runs and tests that exercise ranking.
pub struct FakeEmbeddings {
    dim: usize,
    id: String,
}

impl FakeEmbeddings {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddings {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shapes_norm_and_determinism() {
        let fake = FakeEmbeddings::new(64);
        let texts = vec!["hello world".to_string(), "hello world".to_string()];
        let embs = fake.embed_batch(&texts).await.expect("embed_batch");
        let (v1, v2) = (&embs[0], &embs[1]);

        assert_eq!(v1.len(), 64);
        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
        for (a, b) in v1.iter().zip(v2.iter()) {
            assert!((a - b).abs() <= 1e-6);
        }
    }

    #[test]
    fn shared_words_score_higher() {
        let fake = FakeEmbeddings::new(256);
        let q = fake.embed_text("solar panel wiring");
        let near = fake.embed_text("wiring a solar panel to a battery");
        let far = fake.embed_text("sourdough bread starter recipe");
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[test]
    fn blank_text_is_a_zero_vector() {
        let fake = FakeEmbeddings::new(8);
        assert!(fake.embed_text("   ").iter().all(|x| *x == 0.0));
    }
}
