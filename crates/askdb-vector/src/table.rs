//! LanceDB connection and table helpers.

use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator};
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.iter().any(|n| n == name) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Upserts `batch` keyed on `id` in a single commit. Rows outside the batch
/// that match `delete_filter` are removed in the same commit.
pub async fn upsert(conn: &Connection, name: &str, batch: RecordBatch, delete_filter: Option<String>) -> Result<()> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    let table = conn.open_table(name).execute().await?;
    let mut mi = table.merge_insert(&["id"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    if let Some(filter) = delete_filter {
        mi.when_not_matched_by_source_delete(Some(filter));
    }
    let _ = mi.execute(reader).await?;
    Ok(())
}

/// SQL string literal with single quotes escaped.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
