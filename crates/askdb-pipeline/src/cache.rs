use std::sync::Arc;
use tracing::debug;

use askdb_core::traits::ChunkStore;
use askdb_core::types::Chunk;

/// The store's chunk list, tagged with the store generation it was read at.
#[derive(Debug, Default)]
pub struct ChunkCache {
    chunks: Vec<Arc<Chunk>>,
    generation: Option<u64>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid_for(&self, generation: u64) -> bool {
        self.generation == Some(generation)
    }

    pub fn invalidate(&mut self) {
        self.chunks.clear();
        self.generation = None;
    }

    /// Cached chunks when the store generation still matches, otherwise a
    /// fresh read.
    pub fn load(&mut self, store: &dyn ChunkStore) -> anyhow::Result<&[Arc<Chunk>]> {
        let generation = store.generation()?;
        if !self.is_valid_for(generation) {
            let chunks = store.get_all()?;
            debug!(generation, chunks = chunks.len(), "reloaded chunk cache");
            self.chunks = chunks.into_iter().map(Arc::new).collect();
            self.generation = Some(generation);
        }
        Ok(&self.chunks)
    }
}
