//! ragfuse-rerank
//!
//! Second-stage scoring of a candidate list. The model is chosen once at
//! construction: a cross-encoder scoring (query, text) pairs, or a listwise
//! LLM judge. Either way the output is a subset of the input, at most
//! `top_n` long, with `Reranked` provenance.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use ragfuse_core::config::RerankerConfig;
use ragfuse_core::error::{Error, Result};
use ragfuse_core::traits::{ContentResolver, Generator, PairScorer};
use ragfuse_core::types::{Provenance, RerankerKind, ScoredCandidate};

pub mod listwise;

#[derive(Clone)]
pub enum RerankModel {
    CrossEncoder(Arc<dyn PairScorer>),
    Llm(Arc<dyn Generator>),
}

impl RerankModel {
    pub fn kind(&self) -> RerankerKind {
        match self {
            Self::CrossEncoder(_) => RerankerKind::CrossEncoder,
            Self::Llm(_) => RerankerKind::Llm,
        }
    }
}

pub struct Reranker {
    model: RerankModel,
    resolver: Arc<dyn ContentResolver>,
    top_n: usize,
    batch_size: usize,
    fallback_on_error: bool,
    timeout: Option<Duration>,
}

impl Reranker {
    pub fn new(cfg: &RerankerConfig, model: RerankModel, resolver: Arc<dyn ContentResolver>) -> Result<Self> {
        if cfg.kind != model.kind() {
            return Err(Error::InvalidConfig(format!("reranker kind {:?} does not match the supplied {:?} model", cfg.kind, model.kind())));
        }
        cfg.validate()?;
        Ok(Self { model, resolver, top_n: cfg.top_n, batch_size: cfg.batch_size, fallback_on_error: cfg.fallback_on_error, timeout: None })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn top_n(&self) -> usize { self.top_n }

    /// Rerank `candidates` for `query`. Empty input returns immediately.
    pub async fn postprocess(&self, candidates: Vec<ScoredCandidate>, query: &str) -> Result<Vec<ScoredCandidate>> {
        if candidates.is_empty() { return Ok(candidates); }
        let texts = candidates.iter().map(|c| self.resolver.resolve(&c.chunk_id)).collect::<Result<Vec<String>>>()?;

        let scored = match self.timeout {
            Some(d) => tokio::time::timeout(d, self.score(query, &texts))
                .await
                .unwrap_or_else(|_| Err(Error::RerankUnavailable(format!("timed out after {:?}", d)))),
            None => self.score(query, &texts).await,
        };

        match scored {
            Ok(scores) => {
                let mut out: Vec<ScoredCandidate> = scores
                    .into_iter()
                    .map(|(i, s)| ScoredCandidate::new(candidates[i].chunk_id.clone(), s, Provenance::Reranked))
                    .collect();
                // stable: equal scores keep input order
                out.sort_by(|a, b| b.score.total_cmp(&a.score));
                out.truncate(self.top_n);
                debug!(input = candidates.len(), output = out.len(), "reranked");
                Ok(out)
            }
            Err(e) if self.fallback_on_error => {
                warn!(error = %e, "reranker unavailable; keeping retrieval order");
                let mut out = candidates;
                out.truncate(self.top_n);
                Ok(out)
            }
            Err(e) => Err(e),
        }
    }

    /// `(input index, score)` for every candidate the model kept.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<(usize, f32)>> {
        match &self.model {
            RerankModel::CrossEncoder(scorer) => {
                let mut out = Vec::with_capacity(texts.len());
                for (b, batch) in texts.chunks(self.batch_size).enumerate() {
                    let scorer = Arc::clone(scorer);
                    let q = query.to_string();
                    let batch = batch.to_vec();
                    let n = batch.len();
                    let scores = tokio::task::spawn_blocking(move || scorer.score_pairs(&q, &batch))
                        .await
                        .map_err(|e| Error::RerankUnavailable(e.to_string()))?
                        .map_err(|e| Error::RerankUnavailable(format!("{:#}", e)))?;
                    if scores.len() != n {
                        return Err(Error::RerankUnavailable(format!("pair scorer returned {} scores for {} pairs", scores.len(), n)));
                    }
                    out.extend(scores.into_iter().enumerate().map(|(i, s)| (b * self.batch_size + i, s)));
                }
                Ok(out)
            }
            RerankModel::Llm(generator) => {
                let calls = texts.chunks(self.batch_size).enumerate().map(|(b, batch)| {
                    let prompt = listwise::build_prompt(query, batch);
                    let generator = Arc::clone(generator);
                    let offset = b * self.batch_size;
                    let n = batch.len();
                    async move {
                        let answer = generator.complete(&prompt).await.map_err(|e| Error::RerankUnavailable(e.to_string()))?;
                        Ok::<_, Error>(listwise::parse_judgements(&answer, n).into_iter().map(move |(i, s)| (offset + i, s)).collect::<Vec<_>>())
                    }
                });
                let mut out = Vec::with_capacity(texts.len());
                for batch in join_all(calls).await {
                    out.extend(batch?);
                }
                Ok(out)
            }
        }
    }
}
