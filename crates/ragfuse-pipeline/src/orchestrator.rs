//! The fusion orchestrator: retrieval, optional reranking, context assembly
//! and generation under one of four strategies.

use std::sync::Arc;
use tracing::{debug, info, warn};

use ragfuse_core::config::PipelineConfig;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::ranking::dedup_keep_max;
use ragfuse_core::traits::{ContentResolver, Generator, Retriever};
use ragfuse_core::types::{FusionStrategy, PipelineOutput, Query, RerankerKind, ScoredCandidate};
use ragfuse_hybrid::{bounded, reciprocal_rank_fusion, HybridRetriever};
use ragfuse_rerank::Reranker;

use crate::context::{format_qa_prompt, render_context};

pub struct FusionPipeline {
    cfg: PipelineConfig,
    retriever: HybridRetriever,
    reranker: Option<Reranker>,
    resolver: Arc<dyn ContentResolver>,
    generator: Option<Arc<dyn Generator>>,
}

/// One retrieval path after reranking; `None` when the path was unavailable.
type PathList = Option<Vec<ScoredCandidate>>;

impl FusionPipeline {
    pub fn new(
        cfg: PipelineConfig,
        retriever: HybridRetriever,
        reranker: Option<Reranker>,
        resolver: Arc<dyn ContentResolver>,
        generator: Option<Arc<dyn Generator>>,
    ) -> Result<Self> {
        cfg.validate()?;
        if cfg.fusion_strategy.is_dual_path() && !(retriever.has_dense() && retriever.has_sparse()) {
            return Err(Error::InvalidConfig(format!("{:?} needs both dense and sparse retrievers", cfg.fusion_strategy)));
        }
        match (cfg.reranker.kind, reranker.is_some()) {
            (RerankerKind::None, true) => return Err(Error::InvalidConfig("reranker supplied but reranker.kind is none".into())),
            (kind, false) if kind != RerankerKind::None => {
                return Err(Error::InvalidConfig(format!("reranker.kind is {:?} but no reranker was supplied", kind)))
            }
            _ => {}
        }
        if !cfg.retrieval_only && generator.is_none() {
            return Err(Error::InvalidConfig("a generator is required unless retrieval_only is set".into()));
        }
        let reranker = reranker.map(|r| r.with_timeout(cfg.timeouts.rerank()));
        info!(strategy = ?cfg.fusion_strategy, mode = ?cfg.retrieval_mode, reranker = ?cfg.reranker.kind, "fusion pipeline ready");
        Ok(Self { cfg, retriever, reranker, resolver, generator })
    }

    pub fn config(&self) -> &PipelineConfig { &self.cfg }

    pub async fn run(&self, query: &Query) -> Result<PipelineOutput> {
        debug!(query = %query.text, filter = ?query.directory_filter, "pipeline run");
        match self.cfg.fusion_strategy {
            FusionStrategy::SinglePass => self.single_pass(query).await,
            strategy => self.dual_path(query, strategy).await,
        }
    }

    async fn single_pass(&self, query: &Query) -> Result<PipelineOutput> {
        let top_k = self.retriever.default_top_k(&self.cfg);
        let candidates = self.drop_unknown(self.retriever.retrieve(query, top_k).await?);
        let candidates = dedup_keep_max(self.rerank(candidates, &query.text).await?);
        let contexts = self.resolve_all(&candidates)?;
        if let Some(out) = self.without_generation(&candidates, &contexts) {
            return Ok(out);
        }
        let answer = self.generate(&contexts, &query.text).await?;
        Ok(PipelineOutput { answer, candidates, contexts })
    }

    async fn dual_path(&self, query: &Query, strategy: FusionStrategy) -> Result<PipelineOutput> {
        let (dense, sparse) = self.retriever.retrieve_both(query, self.cfg.dense_top_k, self.cfg.sparse_top_k).await;
        let dense = degrade(dense, "dense")?.map(|l| self.drop_unknown(l));
        let sparse = degrade(sparse, "sparse")?.map(|l| self.drop_unknown(l));
        if dense.is_none() && sparse.is_none() {
            return Err(Error::retrieval(ragfuse_core::types::Provenance::Hybrid, "dense and sparse paths both unavailable"));
        }

        let (dense, sparse) = tokio::join!(self.rerank_path(dense, &query.text), self.rerank_path(sparse, &query.text));
        let (dense, sparse) = (dense?, sparse?);

        let lists: Vec<Vec<ScoredCandidate>> = [sparse.clone(), dense.clone()].into_iter().flatten().collect();
        let fused = reciprocal_rank_fusion(&lists, self.cfg.rank_constant, self.cfg.fusion_top_k);

        if self.cfg.retrieval_only || strategy == FusionStrategy::FuseThenGenerate {
            let contexts = self.resolve_all(&fused)?;
            if let Some(out) = self.without_generation(&fused, &contexts) {
                return Ok(out);
            }
            let answer = self.generate(&contexts, &query.text).await?;
            return Ok(PipelineOutput { answer, candidates: fused, contexts });
        }

        let dense_ctx = dense.as_ref().map(|l| self.resolve_all(l)).transpose()?;
        let sparse_ctx = sparse.as_ref().map(|l| self.resolve_all(l)).transpose()?;
        if fused.is_empty() {
            if let Some(answer) = &self.cfg.empty_context_answer {
                debug!("no candidates; returning configured empty-context answer");
                return Ok(PipelineOutput { answer: answer.clone(), candidates: fused, contexts: Vec::new() });
            }
        }

        let (dense_answer, sparse_answer) = tokio::join!(
            self.generate_path(dense_ctx.as_deref(), &query.text),
            self.generate_path(sparse_ctx.as_deref(), &query.text),
        );
        let dense_out = dense_answer.map(|r| r.map(|a| (a, dense_ctx.unwrap_or_default())));
        let sparse_out = sparse_answer.map(|r| r.map(|a| (a, sparse_ctx.unwrap_or_default())));

        let (answer, contexts) = match (dense_out, sparse_out) {
            (Some(Ok((d, dc))), Some(Ok((s, sc)))) => match strategy {
                FusionStrategy::GenerateBothConcatenate => (format!("{}\n{}", s, d), sc.into_iter().chain(dc).collect()),
                _ if d.chars().count() >= s.chars().count() => (d, dc),
                _ => (s, sc),
            },
            (Some(Ok(one)), other) | (other, Some(Ok(one))) => {
                if let Some(Err(e)) = other {
                    warn!(error = %e, "one generation failed; using the surviving answer");
                }
                one
            }
            (Some(Err(e)), _) | (None, Some(Err(e))) => return Err(e),
            (None, None) => return Err(Error::GenerationFailure("no retrieval path produced a generation".into())),
        };
        Ok(PipelineOutput { answer, candidates: fused, contexts })
    }

    async fn rerank(&self, candidates: Vec<ScoredCandidate>, query: &str) -> Result<Vec<ScoredCandidate>> {
        match &self.reranker {
            Some(r) => r.postprocess(candidates, query).await,
            None => Ok(candidates),
        }
    }

    async fn rerank_path(&self, list: PathList, query: &str) -> Result<PathList> {
        match list {
            Some(l) => Ok(Some(dedup_keep_max(self.rerank(l, query).await?))),
            None => Ok(None),
        }
    }

    /// Drop candidates the resolver cannot resolve, so a vector collection
    /// built from an older corpus costs those hits instead of the request.
    fn drop_unknown(&self, candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let before = candidates.len();
        let kept: Vec<ScoredCandidate> = candidates.into_iter().filter(|c| self.resolver.knows(&c.chunk_id)).collect();
        if kept.len() < before {
            warn!(dropped = before - kept.len(), "retrieved ids missing from the corpus; re-run ingest with --reindex");
        }
        kept
    }

    fn resolve_all(&self, candidates: &[ScoredCandidate]) -> Result<Vec<String>> {
        candidates.iter().map(|c| self.resolver.resolve(&c.chunk_id)).collect()
    }

    /// Retrieval-only output, or the configured answer for an empty candidate list.
    fn without_generation(&self, candidates: &[ScoredCandidate], contexts: &[String]) -> Option<PipelineOutput> {
        if self.cfg.retrieval_only {
            return Some(PipelineOutput { answer: String::new(), candidates: candidates.to_vec(), contexts: contexts.to_vec() });
        }
        if candidates.is_empty() {
            if let Some(answer) = &self.cfg.empty_context_answer {
                debug!("no candidates; returning configured empty-context answer");
                return Some(PipelineOutput { answer: answer.clone(), candidates: Vec::new(), contexts: Vec::new() });
            }
        }
        None
    }

    async fn generate(&self, contexts: &[String], query: &str) -> Result<String> {
        let generator = self.generator.as_ref().ok_or_else(|| Error::GenerationFailure("no generator configured".into()))?;
        let prompt = format_qa_prompt(&render_context(contexts), query);
        let limit = self.cfg.timeouts.generation();
        let answer = bounded(limit, generator.complete(&prompt), || Error::GenerationFailure("generation timed out".into())).await?;
        Ok(answer)
    }

    async fn generate_path(&self, contexts: Option<&[String]>, query: &str) -> Option<Result<String>> {
        match contexts {
            Some(c) => Some(self.generate(c, query).await),
            None => None,
        }
    }
}

/// A path that is unavailable becomes `None`; any other error is fatal.
fn degrade(result: Result<Vec<ScoredCandidate>>, path: &str) -> Result<PathList> {
    match result {
        Ok(list) => Ok(Some(list)),
        Err(e) if e.is_retrieval_unavailable() => {
            warn!(error = %e, path, "retrieval path unavailable; continuing with the other");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
