//! LanceDB connection and housekeeping helpers.
use anyhow::Result;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection};
use std::sync::Arc;

use ragfuse_core::traits::VectorPoint;
use ragfuse_core::types::META_DIR;

use crate::schema::build_arrow_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, dim: i32) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let schema = build_arrow_schema(dim);
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub fn points_to_record_batch(points: &[VectorPoint], dim: i32) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(points.len());
    let mut dirs = Vec::with_capacity(points.len());
    let mut metas = Vec::with_capacity(points.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(points.len());
    for p in points {
        anyhow::ensure!(p.vector.len() == dim as usize, "point '{}' has dim {}, collection expects {}", p.id, p.vector.len(), dim);
        ids.push(p.id.clone());
        dirs.push(p.metadata.get(META_DIR).cloned().unwrap_or_default());
        metas.push(serde_json::to_string(&p.metadata)?);
        vectors.push(Some(p.vector.iter().map(|&x| Some(x)).collect()));
    }
    let record_batch = RecordBatch::try_new(build_arrow_schema(dim), vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(dirs)),
        Arc::new(StringArray::from(metas)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
    ])?;
    Ok(record_batch)
}

/// SQL string literal with single quotes doubled.
pub fn sql_literal(value: &str) -> String { format!("'{}'", value.replace('\'', "''")) }
