use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::Retriever;
use ragfuse_core::types::{Provenance, Query, ScoredCandidate};
use ragfuse_core::CorpusIndex;

use crate::automerge::AutoMerger;
use crate::index::SparseIndex;

/// Lexical retrieval path: BM25 over leaves, then optional auto-merge.
pub struct SparseRetriever {
    index: Arc<SparseIndex>,
    merger: Option<AutoMerger>,
}

impl SparseRetriever {
    pub fn new(index: Arc<SparseIndex>) -> Self { Self { index, merger: None } }

    pub fn with_auto_merge(mut self, merger: AutoMerger) -> Self {
        self.merger = Some(merger);
        self
    }

    /// Build the index from `corpus`; auto-merge is enabled only when a ratio
    /// is given and the corpus actually has parent/child links.
    pub fn from_corpus(corpus: Arc<CorpusIndex>, stop_words: &[String], merge_ratio: Option<f32>) -> Result<Self> {
        let index = SparseIndex::build(&corpus, stop_words).map_err(|e| Error::retrieval(Provenance::Sparse, e))?;
        let retriever = Self::new(Arc::new(index));
        match merge_ratio {
            Some(ratio) if corpus.has_hierarchy() => Ok(retriever.with_auto_merge(AutoMerger::new(corpus, ratio)?)),
            _ => Ok(retriever),
        }
    }

    pub fn auto_merge_enabled(&self) -> bool { self.merger.is_some() }
}

#[async_trait]
impl Retriever for SparseRetriever {
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        if self.index.num_docs() == 0 {
            return Err(Error::retrieval(Provenance::Sparse, "lexical index is empty"));
        }
        let index = Arc::clone(&self.index);
        let text = query.text.clone();
        let filter = query.filter();
        let search_filter = filter.clone();
        let hits = tokio::task::spawn_blocking(move || index.search(&text, top_k, search_filter.as_ref()))
            .await
            .map_err(|e| Error::retrieval(Provenance::Sparse, e))?
            .map_err(|e| Error::retrieval(Provenance::Sparse, e))?;
        if hits.is_empty() {
            debug!(filter = ?filter, "sparse retrieval produced an empty set");
            return Ok(hits);
        }
        Ok(match &self.merger {
            Some(merger) => merger.merge(hits, filter.as_ref()),
            None => hits,
        })
    }
}
