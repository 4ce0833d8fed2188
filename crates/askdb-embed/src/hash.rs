use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use askdb_core::traits::Embedder;
use askdb_core::types::Embedding;
use askdb_text::tokenize;

use crate::l2_normalize;

/// Deterministic bag-of-tokens embedder: each token is hashed into one bucket
/// with a positive weight, then the vector is L2-normalized. Texts sharing
/// tokens land close together; text with no tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn embed_one(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        for token in tokenize(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + 0.5 * weight;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
