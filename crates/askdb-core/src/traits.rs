//! Collaborator seams the pipeline is generic over.

use crate::types::{Chunk, Embedding};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>>;

    fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Decoding parameters forwarded to the language model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Always pick the most likely token.
    pub greedy: bool,
}

pub trait Generator: Send + Sync {
    /// Returns the full generated text. When `on_partial` is set it receives
    /// each new fragment as it is produced.
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        on_partial: Option<&mut dyn FnMut(&str)>,
    ) -> anyhow::Result<String>;
}

/// Persistent chunk storage. `get_all` returns chunks in storage order.
pub trait ChunkStore: Send {
    fn get_all(&self) -> anyhow::Result<Vec<Chunk>>;
    fn put(&mut self, chunk: Chunk) -> anyhow::Result<()>;

    fn put_batch(&mut self, chunks: Vec<Chunk>) -> anyhow::Result<()> {
        for chunk in chunks {
            self.put(chunk)?;
        }
        Ok(())
    }

    /// Removes every chunk of `doc_id` and returns how many were removed.
    fn delete_by_doc(&mut self, doc_id: &str) -> anyhow::Result<usize>;

    /// Swaps the stored chunks of `doc_id` for `chunks` in one step and
    /// returns how many old chunks were dropped. On error the previous
    /// version of the document must still be stored.
    fn replace_document(&mut self, doc_id: &str, chunks: Vec<Chunk>) -> anyhow::Result<usize>;

    /// Changes whenever the stored contents change.
    fn generation(&self) -> anyhow::Result<u64>;
}
