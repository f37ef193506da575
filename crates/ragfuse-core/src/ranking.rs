//! Ordering helpers shared by every component that emits a ranked list.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::ScoredCandidate;

/// Descending by score, ties by ascending chunk id.
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(compare_candidates);
}

pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Collapse repeated chunk ids into one entry carrying the highest score.
///
/// Relative order of the survivors is preserved except where a later,
/// higher-scored duplicate moves an entry up; the result is then stably
/// sorted by score so reranker tie order survives.
pub fn dedup_keep_max(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut out: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for c in candidates {
        match seen.get(&c.chunk_id) {
            Some(&idx) => {
                if c.score > out[idx].score { out[idx] = c; }
            }
            None => {
                seen.insert(c.chunk_id.clone(), out.len());
                out.push(c);
            }
        }
    }
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out
}
