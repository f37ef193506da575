use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkId, Meta, MetadataFilter, Query, ScoredCandidate};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Pairwise relevance model (cross-encoder). Higher is more relevant.
pub trait PairScorer: Send + Sync {
    fn score_pairs(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub metadata: Meta,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn create_collection(&self) -> Result<()>;
    async fn delete_collection(&self) -> Result<()>;
    async fn upsert(&self, points: &[VectorPoint]) -> Result<()>;
    /// Nearest neighbours of `query_vector`, highest similarity first. The
    /// filter is applied before the `k` limit.
    async fn search(&self, query_vector: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<(ChunkId, f32)>>;
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub trait ContentResolver: Send + Sync {
    fn resolve(&self, chunk_id: &str) -> Result<String>;

    /// Whether `chunk_id` can be resolved at all. Retrieval can surface ids
    /// the resolver no longer holds, e.g. a vector collection built from an
    /// older corpus.
    fn knows(&self, _chunk_id: &str) -> bool { true }
}

/// A retrieval path. The query carries its own filter so one retriever can
/// serve concurrent requests with different filters.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<ScoredCandidate>>;
}
