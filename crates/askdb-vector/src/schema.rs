//! Arrow layout of the chunk table and conversions to and from `Chunk`.

use anyhow::{anyhow, Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use askdb_core::types::{Chunk, ChunkMetadata};

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("chunk_index", DataType::UInt32, true),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

pub fn chunks_to_record_batch(chunks: &[Chunk], dim: i32) -> Result<RecordBatch> {
    let width = usize::try_from(dim).context("negative embedding width")?;
    let mut ids = Vec::with_capacity(chunks.len());
    let mut doc_ids = Vec::with_capacity(chunks.len());
    let mut texts = Vec::with_capacity(chunks.len());
    let mut pages = Vec::with_capacity(chunks.len());
    let mut indices = Vec::with_capacity(chunks.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.embedding.len() != width {
            return Err(anyhow!(
                "chunk {} has {} dimensions, table expects {}",
                chunk.id,
                chunk.embedding.len(),
                width
            ));
        }
        ids.push(chunk.id.clone());
        doc_ids.push(chunk.doc_id.clone());
        texts.push(chunk.text.clone());
        pages.push(chunk.metadata.page);
        indices.push(chunk.metadata.chunk_index);
        vectors.push(Some(chunk.embedding.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(indices)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?;
    Ok(batch)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

pub fn record_batch_to_chunks(batch: &RecordBatch) -> Result<Vec<Chunk>> {
    let ids = string_column(batch, "id")?;
    let doc_ids = string_column(batch, "doc_id")?;
    let texts = string_column(batch, "text")?;
    let pages = u32_column(batch, "page")?;
    let indices = u32_column(batch, "chunk_index")?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("vector column missing"))?;

    let optional = |col: &UInt32Array, i: usize| col.is_valid(i).then(|| col.value(i));
    let mut chunks = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let embedding = if vectors.is_valid(i) {
            vectors.value(i).as_primitive::<Float32Type>().values().iter().copied().collect()
        } else {
            Vec::new()
        };
        chunks.push(Chunk {
            id: ids.value(i).to_string(),
            doc_id: doc_ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            metadata: ChunkMetadata { page: optional(pages, i), chunk_index: optional(indices, i) },
            embedding,
        });
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::types::ChunkDraft;

    #[test]
    fn batch_conversion_keeps_optional_metadata() {
        let chunks = vec![
            ChunkDraft::with_metadata("first", ChunkMetadata::new(Some(1), Some(0))).into_chunk("d", 0, vec![0.5, 0.5]),
            Chunk {
                id: "d:x".into(),
                doc_id: "d".into(),
                text: "loose".into(),
                metadata: ChunkMetadata::default(),
                embedding: vec![1.0, 0.0],
            },
        ];
        let batch = chunks_to_record_batch(&chunks, 2).unwrap();
        assert_eq!(batch.num_rows(), 2);
        let back = record_batch_to_chunks(&batch).unwrap();
        assert_eq!(back, chunks);
    }

    #[test]
    fn rejects_wrong_width() {
        let chunk = ChunkDraft::new("x").into_chunk("d", 0, vec![1.0]);
        assert!(chunks_to_record_batch(&[chunk], 3).is_err());
    }
}
