use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{Embedder, Retriever, VectorIndex};
use ragfuse_core::types::{Provenance, Query, ScoredCandidate};
use ragfuse_core::ranking::sort_candidates;

/// Semantic retrieval path: embed the query, nearest-neighbour search with the
/// query's filter pushed into the index.
pub struct DenseRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl DenseRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self { Self { index, embedder } }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let texts = vec![text.to_string()];
        let mut rows = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::retrieval(Provenance::Dense, e))?
            .map_err(|e| Error::retrieval(Provenance::Dense, format!("embedding failed: {:#}", e)))?;
        rows.pop().ok_or_else(|| Error::retrieval(Provenance::Dense, "embedder returned no vector"))
    }
}

#[async_trait]
impl Retriever for DenseRetriever {
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let vector = self.embed_query(&query.text).await?;
        let filter = query.filter();
        let hits = self.index.search(&vector, top_k, filter.as_ref()).await.map_err(|e| match e {
            e @ Error::RetrievalUnavailable { .. } => e,
            other => Error::retrieval(Provenance::Dense, other),
        })?;
        let mut out: Vec<ScoredCandidate> = hits.into_iter().map(|(id, s)| ScoredCandidate::new(id, s, Provenance::Dense)).collect();
        sort_candidates(&mut out);
        out.truncate(top_k);
        if out.is_empty() { debug!(filter = ?filter, "dense retrieval produced an empty set"); }
        Ok(out)
    }
}
