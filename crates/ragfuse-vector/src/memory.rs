use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{VectorIndex, VectorPoint};
use ragfuse_core::types::{ChunkId, MetadataFilter};

/// Brute-force cosine index kept in memory. Used by tests and small corpora.
pub struct InMemoryVectorIndex {
    dim: usize,
    points: RwLock<HashMap<ChunkId, VectorPoint>>,
}

impl InMemoryVectorIndex {
    pub fn new(dim: usize) -> Self { Self { dim, points: RwLock::new(HashMap::new()) } }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn create_collection(&self) -> Result<()> { Ok(()) }

    async fn delete_collection(&self) -> Result<()> {
        self.points.write().await.clear();
        Ok(())
    }

    async fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        if let Some(p) = points.iter().find(|p| p.vector.len() != self.dim) {
            return Err(Error::Operation(format!("point '{}' has dim {}, index expects {}", p.id, p.vector.len(), self.dim)));
        }
        let mut guard = self.points.write().await;
        for p in points { guard.insert(p.id.clone(), p.clone()); }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<(ChunkId, f32)>> {
        let guard = self.points.read().await;
        let mut hits: Vec<(ChunkId, f32)> = guard
            .values()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.metadata)))
            .map(|p| (p.id.clone(), cosine(query_vector, &p.vector)))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> { Ok(self.points.read().await.len()) }
}
