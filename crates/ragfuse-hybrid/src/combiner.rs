//! Hybrid combiner: dense only, sparse only, or both fused by a weighted sum
//! of min-max normalized scores.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use ragfuse_core::config::PipelineConfig;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::ranking::sort_candidates;
use ragfuse_core::traits::Retriever;
use ragfuse_core::types::{ChunkId, Provenance, Query, RetrievalMode, ScoredCandidate};

use crate::timeout::bounded;

pub struct HybridRetriever {
    mode: RetrievalMode,
    dense: Option<Arc<dyn Retriever>>,
    sparse: Option<Arc<dyn Retriever>>,
    dense_weight: f32,
    sparse_weight: f32,
    dense_top_k: usize,
    sparse_top_k: usize,
    timeout: Option<Duration>,
}

impl HybridRetriever {
    /// Fails with `InvalidConfig` when the mode needs a retriever that was
    /// not supplied or the weights cannot produce a ranking.
    pub fn new(
        cfg: &PipelineConfig,
        dense: Option<Arc<dyn Retriever>>,
        sparse: Option<Arc<dyn Retriever>>,
    ) -> Result<Self> {
        let mode = cfg.retrieval_mode;
        let needs_dense = matches!(mode, RetrievalMode::Dense | RetrievalMode::Hybrid);
        let needs_sparse = matches!(mode, RetrievalMode::Sparse | RetrievalMode::Hybrid);
        if needs_dense && dense.is_none() {
            return Err(Error::InvalidConfig(format!("{:?} mode requires a dense retriever", mode)));
        }
        if needs_sparse && sparse.is_none() {
            return Err(Error::InvalidConfig(format!("{:?} mode requires a sparse retriever", mode)));
        }
        if !(cfg.dense_weight >= 0.0 && cfg.sparse_weight >= 0.0) || (mode == RetrievalMode::Hybrid && cfg.dense_weight + cfg.sparse_weight <= 0.0) {
            return Err(Error::InvalidConfig("hybrid weights must be non-negative with a positive sum".into()));
        }
        if cfg.dense_top_k == 0 || cfg.sparse_top_k == 0 {
            return Err(Error::InvalidConfig("per-source top_k must be > 0".into()));
        }
        Ok(Self {
            mode,
            dense,
            sparse,
            dense_weight: cfg.dense_weight,
            sparse_weight: cfg.sparse_weight,
            dense_top_k: cfg.dense_top_k,
            sparse_top_k: cfg.sparse_top_k,
            timeout: cfg.timeouts.retrieval(),
        })
    }

    pub fn mode(&self) -> RetrievalMode { self.mode }

    pub fn has_dense(&self) -> bool { self.dense.is_some() }

    pub fn has_sparse(&self) -> bool { self.sparse.is_some() }

    /// Default top-k for a single-pass call in this mode.
    pub fn default_top_k(&self, cfg: &PipelineConfig) -> usize {
        match self.mode {
            RetrievalMode::Dense => cfg.dense_top_k,
            RetrievalMode::Sparse => cfg.sparse_top_k,
            RetrievalMode::Hybrid => cfg.hybrid_top_k,
        }
    }

    async fn from_source(&self, path: Provenance, query: &Query, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        let retriever = match path {
            Provenance::Dense => self.dense.as_ref(),
            _ => self.sparse.as_ref(),
        };
        let Some(retriever) = retriever else {
            return Err(Error::retrieval(path, "retriever not configured"));
        };
        bounded(self.timeout, retriever.retrieve(query, top_k), || Error::retrieval(path, "timed out")).await
    }

    /// Both paths concurrently; a timeout on one does not cancel the other.
    pub async fn retrieve_both(&self, query: &Query, dense_top_k: usize, sparse_top_k: usize) -> (Result<Vec<ScoredCandidate>>, Result<Vec<ScoredCandidate>>) {
        tokio::join!(
            self.from_source(Provenance::Dense, query, dense_top_k),
            self.from_source(Provenance::Sparse, query, sparse_top_k),
        )
    }

    fn combine(&self, dense: &[ScoredCandidate], sparse: &[ScoredCandidate], top_k: usize) -> Vec<ScoredCandidate> {
        let mut sums: HashMap<ChunkId, f32> = HashMap::new();
        for (list, weight) in [(dense, self.dense_weight), (sparse, self.sparse_weight)] {
            for (id, norm) in min_max_normalize(list) {
                let entry = sums.entry(id).or_insert(0.0);
                *entry += weight * norm;
            }
        }
        let mut out: Vec<ScoredCandidate> = sums.into_iter().map(|(id, s)| ScoredCandidate::new(id, s, Provenance::Hybrid)).collect();
        sort_candidates(&mut out);
        out.truncate(top_k);
        out
    }
}

/// Min-max to [0, 1] keeping each chunk's best score; a constant list maps to 1.0.
pub fn min_max_normalize(list: &[ScoredCandidate]) -> Vec<(ChunkId, f32)> {
    let mut best: HashMap<&str, f32> = HashMap::new();
    for c in list {
        let e = best.entry(c.chunk_id.as_str()).or_insert(c.score);
        if c.score > *e { *e = c.score; }
    }
    let (lo, hi) = best.values().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let span = hi - lo;
    best.into_iter()
        .map(|(id, s)| (id.to_string(), if span > f32::EPSILON { (s - lo) / span } else { 1.0 }))
        .collect()
}

fn truncated(mut list: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
    list.truncate(top_k);
    list
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        match self.mode {
            RetrievalMode::Dense => Ok(truncated(self.from_source(Provenance::Dense, query, top_k).await?, top_k)),
            RetrievalMode::Sparse => Ok(truncated(self.from_source(Provenance::Sparse, query, top_k).await?, top_k)),
            RetrievalMode::Hybrid => {
                let (dense, sparse) = self.retrieve_both(query, self.dense_top_k, self.sparse_top_k).await;
                match (dense, sparse) {
                    (Ok(d), Ok(s)) => {
                        debug!(dense = d.len(), sparse = s.len(), "combining hybrid sources");
                        Ok(self.combine(&d, &s, top_k))
                    }
                    (Ok(d), Err(e)) if e.is_retrieval_unavailable() => {
                        warn!(error = %e, "sparse path unavailable; using dense results only");
                        Ok(truncated(d, top_k))
                    }
                    (Err(e), Ok(s)) if e.is_retrieval_unavailable() => {
                        warn!(error = %e, "dense path unavailable; using sparse results only");
                        Ok(truncated(s, top_k))
                    }
                    (Err(de), Err(se)) if de.is_retrieval_unavailable() && se.is_retrieval_unavailable() => {
                        Err(Error::retrieval(Provenance::Hybrid, format!("both paths failed ({}; {})", de, se)))
                    }
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
        }
    }
}
