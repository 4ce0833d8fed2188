//! askdb-embed
//!
//! Embedding backends behind `askdb_core::traits::Embedder`.
pub mod hash;
pub mod ollama;

use std::sync::Arc;
use tracing::info;

use askdb_core::config::{EmbeddingBackend, EmbeddingSettings};
use askdb_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Builds the configured backend. `APP_USE_FAKE_EMBEDDINGS=1` forces the hash
/// embedder regardless of configuration.
pub fn build_embedder(settings: &EmbeddingSettings) -> anyhow::Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if use_fake || settings.backend == EmbeddingBackend::Hash {
        info!(dim = settings.dim, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }
    info!(model = %settings.model, url = %settings.url, "using ollama embedder");
    Ok(Arc::new(OllamaEmbedder::new(settings)?))
}
