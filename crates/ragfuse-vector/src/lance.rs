//! LanceDB-backed `VectorIndex`: one table per collection, cosine distance,
//! `dir` pushed down as a scan predicate.

use anyhow::{anyhow, Result as AnyResult};
use arrow_array::{Array, Float32Array, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use tracing::{debug, info};

use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{VectorIndex, VectorPoint};
use ragfuse_core::types::{ChunkId, MetadataFilter, Provenance, META_DIR};

use crate::schema::{COL_DIR, COL_ID};
use crate::table::{ensure_table, open_db, points_to_record_batch, sql_literal, table_exists};

pub struct LanceVectorIndex {
    db: Connection,
    table_name: String,
    dim: i32,
}

impl LanceVectorIndex {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let dim = i32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("embedding dim {} too large", dim)))?;
        let db = open_db(uri).await.map_err(operation)?;
        info!(uri, table = table_name, dim, "lancedb opened");
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    pub fn table_name(&self) -> &str { &self.table_name }

    fn predicate(filter: Option<&MetadataFilter>) -> AnyResult<Option<String>> {
        match filter {
            None => Ok(None),
            Some(f) if f.key == META_DIR => Ok(Some(format!("{} = {}", COL_DIR, sql_literal(&f.value)))),
            Some(f) => Err(anyhow!("lancedb index cannot filter on metadata key '{}'", f.key)),
        }
    }

    async fn upsert_inner(&self, points: &[VectorPoint]) -> AnyResult<()> {
        ensure_table(&self.db, &self.table_name, self.dim).await?;
        let batch = points_to_record_batch(points, self.dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut mi = table.merge_insert(&[COL_ID]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        Ok(())
    }

    async fn search_inner(&self, query_vector: &[f32], k: usize, filter: Option<&MetadataFilter>) -> AnyResult<Vec<(ChunkId, f32)>> {
        anyhow::ensure!(query_vector.len() == self.dim as usize, "query has dim {}, collection expects {}", query_vector.len(), self.dim);
        let predicate = Self::predicate(filter)?;
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut query = table.vector_search(query_vector.to_vec())?.distance_type(DistanceType::Cosine).limit(k);
        if let Some(p) = &predicate {
            query = query.only_if(p.as_str());
        }
        let mut stream = query.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = batch.column_by_name(COL_ID).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("id column missing"))?;
            let dists = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("_distance column missing"))?;
            for i in 0..batch.num_rows() {
                if dists.is_null(i) { continue; }
                hits.push((ids.value(i).to_string(), 1.0 - dists.value(i)));
            }
        }
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(k);
        debug!(k, n = hits.len(), filtered = predicate.is_some(), "lancedb search");
        Ok(hits)
    }
}

fn operation(e: anyhow::Error) -> Error { Error::Operation(format!("{:#}", e)) }

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn create_collection(&self) -> Result<()> {
        ensure_table(&self.db, &self.table_name, self.dim).await.map_err(operation)
    }

    async fn delete_collection(&self) -> Result<()> {
        let exists = table_exists(&self.db, &self.table_name).await.map_err(operation)?;
        if !exists { return Ok(()); }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(|e| operation(e.into()))?;
        table.delete(&format!("{} IS NOT NULL", COL_ID)).await.map_err(|e| operation(e.into()))?;
        info!(table = %self.table_name, "collection cleared");
        Ok(())
    }

    async fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        if points.is_empty() { return Ok(()); }
        self.upsert_inner(points).await.map_err(operation)
    }

    async fn search(&self, query_vector: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<(ChunkId, f32)>> {
        if k == 0 { return Ok(Vec::new()); }
        self.search_inner(query_vector, k, filter).await.map_err(|e| Error::retrieval(Provenance::Dense, format!("{:#}", e)))
    }

    async fn count(&self) -> Result<usize> {
        if !table_exists(&self.db, &self.table_name).await.map_err(operation)? { return Ok(0); }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(|e| operation(e.into()))?;
        table.count_rows(None).await.map_err(|e| operation(e.into()))
    }
}
