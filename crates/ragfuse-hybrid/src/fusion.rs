//! Reciprocal Rank Fusion: score = Σ 1/(k + rank_i), ranks 1-indexed.

use std::collections::{HashMap, HashSet};

use ragfuse_core::ranking::sort_candidates;
use ragfuse_core::types::{ChunkId, Provenance, ScoredCandidate};

pub const DEFAULT_RANK_CONSTANT: f32 = 60.0;

/// Fuse ranked lists by position only; input scores are ignored. A chunk
/// repeated within one list counts at its first position.
pub fn reciprocal_rank_fusion(lists: &[Vec<ScoredCandidate>], rank_constant: f32, top_k: usize) -> Vec<ScoredCandidate> {
    let k = f64::from(rank_constant);
    let mut scores: HashMap<ChunkId, f64> = HashMap::new();
    for list in lists {
        let mut seen: HashSet<&str> = HashSet::new();
        for (pos, c) in list.iter().enumerate() {
            if !seen.insert(c.chunk_id.as_str()) { continue; }
            *scores.entry(c.chunk_id.clone()).or_default() += 1.0 / (k + (pos + 1) as f64);
        }
    }
    let mut fused: Vec<ScoredCandidate> =
        scores.into_iter().map(|(id, s)| ScoredCandidate::new(id, s as f32, Provenance::Fused)).collect();
    sort_candidates(&mut fused);
    fused.truncate(top_k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str], p: Provenance) -> Vec<ScoredCandidate> {
        ids.iter().enumerate().map(|(i, id)| ScoredCandidate::new(*id, 1.0 - i as f32 * 0.1, p)).collect()
    }

    #[test]
    fn shared_candidates_rank_first() {
        let dense = list(&["A", "B", "C"], Provenance::Dense);
        let sparse = list(&["B", "A", "D"], Provenance::Sparse);
        let fused = reciprocal_rank_fusion(&[sparse, dense], 60.0, 3);
        let ids: Vec<_> = fused.iter().map(|c| c.chunk_id.as_str()).collect();
        // A and B tie on 1/61 + 1/62; C and D tie on 1/63
        assert_eq!(ids, ["A", "B", "C"]);
        assert!(fused.iter().all(|c| c.provenance == Provenance::Fused));
        assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 62.0) as f32).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        assert!(reciprocal_rank_fusion(&[vec![], vec![]], 60.0, 5).is_empty());
    }
}
