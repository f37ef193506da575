//! Wiring a `FusionPipeline` from configuration and loaded collaborators.

use std::sync::Arc;
use tracing::info;

use ragfuse_core::config::PipelineConfig;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{ContentResolver, Embedder, Generator, PairScorer, Retriever, VectorIndex};
use ragfuse_core::types::{FusionStrategy, RerankerKind, RetrievalMode};
use ragfuse_core::CorpusIndex;
use ragfuse_hybrid::HybridRetriever;
use ragfuse_rerank::{RerankModel, Reranker};
use ragfuse_text::SparseRetriever;
use ragfuse_vector::DenseRetriever;

use crate::context::CorpusResolver;
use crate::orchestrator::FusionPipeline;

/// Everything the pipeline talks to. Model-backed parts are optional and only
/// required by the configuration that uses them.
pub struct Components {
    pub corpus: Arc<CorpusIndex>,
    pub stop_words: Vec<String>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub vector_index: Option<Arc<dyn VectorIndex>>,
    pub pair_scorer: Option<Arc<dyn PairScorer>>,
    pub generator: Option<Arc<dyn Generator>>,
}

pub fn assemble(cfg: PipelineConfig, parts: Components) -> Result<FusionPipeline> {
    cfg.validate()?;
    let dual = cfg.fusion_strategy != FusionStrategy::SinglePass;
    let want_dense = dual || cfg.retrieval_mode != RetrievalMode::Sparse;
    let want_sparse = dual || cfg.retrieval_mode != RetrievalMode::Dense;

    let dense: Option<Arc<dyn Retriever>> = if want_dense {
        let (Some(index), Some(embedder)) = (parts.vector_index, parts.embedder) else {
            return Err(Error::InvalidConfig("dense retrieval needs a vector index and an embedder".into()));
        };
        Some(Arc::new(DenseRetriever::new(index, embedder)))
    } else {
        None
    };
    let sparse: Option<Arc<dyn Retriever>> = if want_sparse {
        Some(Arc::new(SparseRetriever::from_corpus(Arc::clone(&parts.corpus), &parts.stop_words, cfg.merge_ratio)?))
    } else {
        None
    };

    let mut hybrid_cfg = cfg.clone();
    if dual {
        // both paths are consulted independently; the combiner only fans out
        hybrid_cfg.retrieval_mode = RetrievalMode::Hybrid;
    }
    let retriever = HybridRetriever::new(&hybrid_cfg, dense, sparse)?;

    let resolver: Arc<dyn ContentResolver> = Arc::new(CorpusResolver::new(Arc::clone(&parts.corpus), cfg.context_mode));
    let reranker = match cfg.reranker.kind {
        RerankerKind::None => None,
        RerankerKind::CrossEncoder => {
            let scorer = parts.pair_scorer.ok_or_else(|| Error::InvalidConfig("cross-encoder reranker needs a pair scorer".into()))?;
            Some(Reranker::new(&cfg.reranker, RerankModel::CrossEncoder(scorer), Arc::clone(&resolver))?)
        }
        RerankerKind::Llm => {
            let judge = parts.generator.clone().ok_or_else(|| Error::InvalidConfig("LLM reranker needs a generator".into()))?;
            Some(Reranker::new(&cfg.reranker, RerankModel::Llm(judge), Arc::clone(&resolver))?)
        }
    };
    info!(chunks = parts.corpus.len(), "assembling fusion pipeline");
    FusionPipeline::new(cfg, retriever, reranker, resolver, parts.generator)
}
