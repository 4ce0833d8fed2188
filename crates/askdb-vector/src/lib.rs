//! askdb-vector
//!
//! Cosine scoring plus the two chunk stores: an in-memory list and a LanceDB
//! table scanned in full on every read.
pub mod lance_store;
pub mod memory_store;
pub mod schema;
pub mod similarity;
pub mod table;

use askdb_core::config::{expand_path, StoreBackend, StoreSettings};
use askdb_core::traits::ChunkStore;

pub use lance_store::LanceChunkStore;
pub use memory_store::MemoryChunkStore;
pub use similarity::{checked_cosine, cosine};

/// Opens the configured store for embeddings of width `dim`.
pub fn open_store(settings: &StoreSettings, dim: usize) -> anyhow::Result<Box<dyn ChunkStore>> {
    match settings.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryChunkStore::new())),
        StoreBackend::Lancedb => {
            let dir = expand_path(&settings.lancedb_dir);
            Ok(Box::new(LanceChunkStore::open(&dir, &settings.table, dim)?))
        }
    }
}
