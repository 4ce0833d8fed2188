//! Chunk store persisted as a single LanceDB table.
//!
//! The store owns a small tokio runtime and blocks on it, so it can be driven
//! from the synchronous pipeline worker. Reads are full scans; no ANN index is
//! built. The table version doubles as the store generation.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::Connection;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

use askdb_core::traits::ChunkStore;
use askdb_core::types::Chunk;

use crate::schema::{build_chunk_schema, chunks_to_record_batch, record_batch_to_chunks};
use crate::table::{ensure_table, open_db, quote, upsert};

pub struct LanceChunkStore {
    runtime: Runtime,
    db: Connection,
    table_name: String,
    dim: i32,
}

impl LanceChunkStore {
    pub fn open(dir: &Path, table_name: &str, dim: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let dim = i32::try_from(dim).context("embedding width does not fit the table schema")?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("askdb-lance")
            .enable_all()
            .build()?;
        let uri = dir.to_string_lossy().to_string();
        let db = runtime.block_on(async {
            let db = open_db(&uri).await?;
            ensure_table(&db, table_name, build_chunk_schema(dim)).await?;
            anyhow::Ok(db)
        })?;
        debug!(uri = %uri, table = table_name, dim, "opened lance chunk store");
        Ok(Self { runtime, db, table_name: table_name.to_string(), dim })
    }

    pub fn count(&self) -> Result<usize> {
        self.runtime.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            anyhow::Ok(table.count_rows(None).await?)
        })
    }
}

impl ChunkStore for LanceChunkStore {
    fn get_all(&self) -> Result<Vec<Chunk>> {
        self.runtime.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let mut stream = table.query().execute().await?;
            let mut chunks = Vec::new();
            while let Some(batch) = stream.try_next().await? {
                chunks.extend(record_batch_to_chunks(&batch)?);
            }
            anyhow::Ok(chunks)
        })
    }

    fn put(&mut self, chunk: Chunk) -> Result<()> {
        self.put_batch(vec![chunk])
    }

    fn put_batch(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let batch = chunks_to_record_batch(&chunks, self.dim)?;
        self.runtime.block_on(upsert(&self.db, &self.table_name, batch, None))
    }

    fn delete_by_doc(&mut self, doc_id: &str) -> Result<usize> {
        let predicate = format!("doc_id = {}", quote(doc_id));
        self.runtime.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let matching = table.count_rows(Some(predicate.clone())).await?;
            if matching > 0 {
                table.delete(&predicate).await?;
            }
            anyhow::Ok(matching)
        })
    }

    fn replace_document(&mut self, doc_id: &str, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return self.delete_by_doc(doc_id);
        }
        let batch = chunks_to_record_batch(&chunks, self.dim)?;
        let predicate = format!("doc_id = {}", quote(doc_id));
        self.runtime.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let previous = table.count_rows(Some(predicate.clone())).await?;
            upsert(&self.db, &self.table_name, batch, Some(predicate)).await?;
            debug!(doc_id, previous, "replaced document");
            anyhow::Ok(previous)
        })
    }

    fn generation(&self) -> Result<u64> {
        self.runtime.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await?;
            anyhow::Ok(table.version().await?)
        })
    }
}
