use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragfuse_core::config::RerankerConfig;
use ragfuse_core::traits::{ContentResolver, Generator, PairScorer};
use ragfuse_core::types::{Provenance, RerankerKind, ScoredCandidate};
use ragfuse_core::{Error, Result};
use ragfuse_embed::FakePairScorer;
use ragfuse_rerank::{RerankModel, Reranker};

struct MapResolver(HashMap<String, String>);

impl ContentResolver for MapResolver {
    fn resolve(&self, chunk_id: &str) -> Result<String> {
        self.0.get(chunk_id).cloned().ok_or_else(|| Error::NotFound(chunk_id.to_string()))
    }
}

fn resolver() -> Arc<dyn ContentResolver> {
    let docs = [
        ("a", "batteries store solar power"),
        ("b", "how to wire a solar panel to batteries"),
        ("c", "bread recipe"),
        ("d", "solar panel cleaning"),
    ];
    Arc::new(MapResolver(docs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()))
}

fn input() -> Vec<ScoredCandidate> {
    ["a", "b", "c", "d"].iter().map(|id| ScoredCandidate::new(*id, 1.0, Provenance::Hybrid)).collect()
}

fn cfg(kind: RerankerKind, top_n: usize) -> RerankerConfig {
    RerankerConfig { kind, top_n, batch_size: 3, ..Default::default() }
}

#[tokio::test]
async fn cross_encoder_orders_by_pair_score() {
    let r = Reranker::new(&cfg(RerankerKind::CrossEncoder, 2), RerankModel::CrossEncoder(Arc::new(FakePairScorer)), resolver()).unwrap();
    let out = r.postprocess(input(), "wire solar panel batteries").await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].chunk_id, "b");
    assert!(out.iter().all(|c| c.provenance == Provenance::Reranked));
}

struct Scripted { answers: Vec<String>, calls: AtomicUsize }

#[async_trait]
impl Generator for Scripted {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // first batch holds documents a, b, c; second holds d
        let idx = if prompt.contains("bread recipe") { 0 } else { 1 };
        Ok(self.answers[idx].clone())
    }
}

#[tokio::test]
async fn llm_judge_drops_omitted_documents() {
    let judge = Arc::new(Scripted {
        answers: vec!["Doc: 2, Relevance: 9\nDoc: 1, Relevance: 5".into(), "Doc: 1, Relevance: 7".into()],
        calls: AtomicUsize::new(0),
    });
    let r = Reranker::new(&cfg(RerankerKind::Llm, 6), RerankModel::Llm(judge.clone()), resolver()).unwrap();
    let out = r.postprocess(input(), "solar").await.unwrap();
    let ids: Vec<_> = out.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, ["b", "d", "a"]);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_input_makes_no_model_call() {
    let judge = Arc::new(Scripted { answers: vec![String::new(), String::new()], calls: AtomicUsize::new(0) });
    let r = Reranker::new(&cfg(RerankerKind::Llm, 3), RerankModel::Llm(judge.clone()), resolver()).unwrap();
    assert!(r.postprocess(vec![], "q").await.unwrap().is_empty());
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
}

struct Offline;

impl PairScorer for Offline {
    fn score_pairs(&self, _: &str, _: &[String]) -> anyhow::Result<Vec<f32>> { anyhow::bail!("model server unreachable") }
}

#[tokio::test]
async fn unreachable_model_is_fatal_unless_fallback() {
    let strict = Reranker::new(&cfg(RerankerKind::CrossEncoder, 2), RerankModel::CrossEncoder(Arc::new(Offline)), resolver()).unwrap();
    assert!(matches!(strict.postprocess(input(), "q").await, Err(Error::RerankUnavailable(_))));

    let lenient_cfg = RerankerConfig { fallback_on_error: true, ..cfg(RerankerKind::CrossEncoder, 2) };
    let lenient = Reranker::new(&lenient_cfg, RerankModel::CrossEncoder(Arc::new(Offline)), resolver()).unwrap();
    let out = lenient.postprocess(input(), "q").await.unwrap();
    let ids: Vec<_> = out.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[test]
fn kind_must_match_model() {
    let err = Reranker::new(&cfg(RerankerKind::Llm, 2), RerankModel::CrossEncoder(Arc::new(FakePairScorer)), resolver()).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

proptest! {
    #[test]
    fn output_is_bounded_subset(order in Just(vec!["a", "b", "c", "d"]).prop_shuffle(), top_n in 1usize..6, query in "(solar|panel|bread|wire) (solar|batteries|recipe)") {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let r = Reranker::new(&cfg(RerankerKind::CrossEncoder, top_n), RerankModel::CrossEncoder(Arc::new(FakePairScorer)), resolver()).unwrap();
        let input: Vec<_> = order.iter().map(|id| ScoredCandidate::new(*id, 0.0, Provenance::Dense)).collect();
        let out = rt.block_on(r.postprocess(input.clone(), &query)).unwrap();
        prop_assert!(out.len() <= top_n.min(input.len()));
        prop_assert!(out.iter().all(|c| input.iter().any(|i| i.chunk_id == c.chunk_id)));
    }
}
