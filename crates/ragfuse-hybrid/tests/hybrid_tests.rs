use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use ragfuse_core::config::PipelineConfig;
use ragfuse_core::traits::Retriever;
use ragfuse_core::types::{Provenance, Query, RetrievalMode, ScoredCandidate};
use ragfuse_core::{Error, Result};
use ragfuse_hybrid::{min_max_normalize, reciprocal_rank_fusion, HybridRetriever};

/// Returns a fixed list, optionally restricted to ids starting with the directory.
struct Fixed { list: Vec<ScoredCandidate>, delay: Option<Duration> }

#[async_trait]
impl Retriever for Fixed {
    async fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<ScoredCandidate>> {
        if let Some(d) = self.delay { tokio::time::sleep(d).await; }
        let mut out: Vec<_> = self.list.iter()
            .filter(|c| query.directory_filter.as_ref().map_or(true, |d| c.chunk_id.starts_with(d.as_str())))
            .cloned().collect();
        out.truncate(top_k);
        Ok(out)
    }
}

struct Down(Provenance);

#[async_trait]
impl Retriever for Down {
    async fn retrieve(&self, _: &Query, _: usize) -> Result<Vec<ScoredCandidate>> { Err(Error::retrieval(self.0, "connection refused")) }
}

fn fixed(items: &[(&str, f32)], p: Provenance) -> Arc<dyn Retriever> {
    Arc::new(Fixed { list: items.iter().map(|(id, s)| ScoredCandidate::new(*id, *s, p)).collect(), delay: None })
}

fn cfg(mode: RetrievalMode) -> PipelineConfig { PipelineConfig { retrieval_mode: mode, ..Default::default() } }

#[tokio::test]
async fn weighted_sum_of_normalized_scores() {
    let dense = fixed(&[("a", 0.9), ("b", 0.5), ("c", 0.1)], Provenance::Dense);
    let sparse = fixed(&[("c", 12.0), ("d", 2.0)], Provenance::Sparse);
    let hybrid = HybridRetriever::new(&cfg(RetrievalMode::Hybrid), Some(dense), Some(sparse)).unwrap();
    let out = hybrid.retrieve(&Query::new("q"), 10).await.unwrap();
    let ids: Vec<_> = out.iter().map(|c| c.chunk_id.as_str()).collect();
    // a: 0.5*1, c: 0.5*0 + 0.5*1, b: 0.5*0.5, d: 0
    assert_eq!(ids, ["a", "c", "b", "d"]);
    assert!(out.iter().all(|c| c.provenance == Provenance::Hybrid));
    assert!((out[2].score - 0.25).abs() < 1e-6);
}

#[tokio::test]
async fn single_source_modes_pass_through() {
    let dense = fixed(&[("a", 0.9), ("b", 0.5)], Provenance::Dense);
    let hybrid = HybridRetriever::new(&cfg(RetrievalMode::Dense), Some(dense), None).unwrap();
    let out = hybrid.retrieve(&Query::new("q"), 1).await.unwrap();
    assert_eq!(out, vec![ScoredCandidate::new("a", 0.9, Provenance::Dense)]);
}

#[tokio::test]
async fn degrades_to_surviving_path() {
    let sparse = fixed(&[("s1", 3.0), ("s2", 1.0)], Provenance::Sparse);
    let hybrid = HybridRetriever::new(&cfg(RetrievalMode::Hybrid), Some(Arc::new(Down(Provenance::Dense))), Some(sparse)).unwrap();
    let out = hybrid.retrieve(&Query::new("q"), 5).await.unwrap();
    let ids: Vec<_> = out.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, ["s1", "s2"]);
}

#[tokio::test]
async fn both_paths_down_is_an_error() {
    let hybrid = HybridRetriever::new(
        &cfg(RetrievalMode::Hybrid),
        Some(Arc::new(Down(Provenance::Dense))),
        Some(Arc::new(Down(Provenance::Sparse))),
    ).unwrap();
    let err = hybrid.retrieve(&Query::new("q"), 5).await.unwrap_err();
    assert!(err.is_retrieval_unavailable());
}

#[tokio::test]
async fn slow_path_times_out_without_cancelling_the_other() {
    let mut c = cfg(RetrievalMode::Hybrid);
    c.timeouts.retrieval_ms = Some(50);
    let slow: Arc<dyn Retriever> = Arc::new(Fixed { list: vec![ScoredCandidate::new("d", 1.0, Provenance::Dense)], delay: Some(Duration::from_secs(5)) });
    let sparse = fixed(&[("s", 1.0)], Provenance::Sparse);
    let hybrid = HybridRetriever::new(&c, Some(slow), Some(sparse)).unwrap();
    let out = hybrid.retrieve(&Query::new("q"), 5).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].chunk_id, "s");
}

#[tokio::test]
async fn filter_reaches_both_paths() {
    let dense = fixed(&[("manuals/a", 0.9), ("guides/b", 0.8)], Provenance::Dense);
    let sparse = fixed(&[("guides/c", 5.0), ("manuals/d", 4.0)], Provenance::Sparse);
    let hybrid = HybridRetriever::new(&cfg(RetrievalMode::Hybrid), Some(dense), Some(sparse)).unwrap();
    let out = hybrid.retrieve(&Query::new("q").with_directory("manuals"), 10).await.unwrap();
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|c| c.chunk_id.starts_with("manuals")));
}

#[test]
fn missing_retriever_is_invalid_config() {
    let err = HybridRetriever::new(&cfg(RetrievalMode::Hybrid), None, Some(fixed(&[], Provenance::Sparse))).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
    let mut zero = cfg(RetrievalMode::Hybrid);
    zero.dense_weight = 0.0;
    zero.sparse_weight = 0.0;
    let err = HybridRetriever::new(&zero, Some(fixed(&[], Provenance::Dense)), Some(fixed(&[], Provenance::Sparse))).err().unwrap();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn constant_source_normalizes_to_one() {
    let list = vec![ScoredCandidate::new("a", 2.0, Provenance::Sparse), ScoredCandidate::new("b", 2.0, Provenance::Sparse)];
    assert!(min_max_normalize(&list).iter().all(|(_, s)| (*s - 1.0).abs() < 1e-6));
}

fn ranked(ids: Vec<u8>) -> Vec<ScoredCandidate> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|i| seen.insert(*i)).enumerate()
        .map(|(pos, i)| ScoredCandidate::new(format!("c{}", i), 1.0 / (pos as f32 + 1.0), Provenance::Dense)).collect()
}

proptest! {
    #[test]
    fn rrf_is_deterministic_and_bounded(a in proptest::collection::vec(0u8..20, 0..15), b in proptest::collection::vec(0u8..20, 0..15), top_k in 1usize..10) {
        let lists = vec![ranked(a), ranked(b)];
        let first = reciprocal_rank_fusion(&lists, 60.0, top_k);
        let second = reciprocal_rank_fusion(&lists, 60.0, top_k);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.len() <= top_k);
        prop_assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
        let mut ids: Vec<_> = first.iter().map(|c| c.chunk_id.clone()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), first.len());
    }

    #[test]
    fn first_in_both_beats_single_list_first(rest in proptest::collection::vec(1u8..20, 0..10)) {
        let mut a = vec![0u8];
        a.extend(rest.iter().copied());
        let b = vec![0u8, 50];
        let fused = reciprocal_rank_fusion(&[ranked(a), ranked(b)], 60.0, 30);
        prop_assert_eq!(fused[0].chunk_id.as_str(), "c0");
    }
}
