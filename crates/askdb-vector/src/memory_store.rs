use askdb_core::traits::ChunkStore;
use askdb_core::types::Chunk;

/// Keeps chunks in insertion order. Re-putting an id replaces it in place.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: Vec<Chunk>,
    generation: u64,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn get_all(&self) -> anyhow::Result<Vec<Chunk>> {
        Ok(self.chunks.clone())
    }

    fn put(&mut self, chunk: Chunk) -> anyhow::Result<()> {
        match self.chunks.iter_mut().find(|c| c.id == chunk.id) {
            Some(existing) => *existing = chunk,
            None => self.chunks.push(chunk),
        }
        self.generation += 1;
        Ok(())
    }

    fn delete_by_doc(&mut self, doc_id: &str) -> anyhow::Result<usize> {
        let before = self.chunks.len();
        self.chunks.retain(|c| c.doc_id != doc_id);
        let removed = before - self.chunks.len();
        if removed > 0 {
            self.generation += 1;
        }
        Ok(removed)
    }

    fn replace_document(&mut self, doc_id: &str, chunks: Vec<Chunk>) -> anyhow::Result<usize> {
        let mut next: Vec<Chunk> = self.chunks.iter().filter(|c| c.doc_id != doc_id).cloned().collect();
        let removed = self.chunks.len() - next.len();
        next.extend(chunks);
        self.chunks = next;
        self.generation += 1;
        Ok(removed)
    }

    fn generation(&self) -> anyhow::Result<u64> {
        Ok(self.generation)
    }
}
