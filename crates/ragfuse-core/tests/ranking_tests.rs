use proptest::prelude::*;
use std::collections::HashSet;

use ragfuse_core::ranking::{dedup_keep_max, sort_candidates};
use ragfuse_core::types::{Provenance, ScoredCandidate};

fn candidates() -> impl Strategy<Value = Vec<ScoredCandidate>> {
    proptest::collection::vec((0u8..12, 0u16..100), 0..30).prop_map(|v| {
        v.into_iter().map(|(id, s)| ScoredCandidate::new(format!("c{}", id), f32::from(s) / 10.0, Provenance::Dense)).collect()
    })
}

proptest! {
    #[test]
    fn dedup_leaves_unique_ids_with_max_scores(input in candidates()) {
        let out = dedup_keep_max(input.clone());
        let ids: HashSet<_> = out.iter().map(|c| c.chunk_id.clone()).collect();
        prop_assert_eq!(ids.len(), out.len());
        for c in &out {
            let best = input.iter().filter(|i| i.chunk_id == c.chunk_id).map(|i| i.score).fold(f32::MIN, f32::max);
            prop_assert_eq!(c.score, best);
        }
        prop_assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn sorting_is_order_independent(mut input in candidates()) {
        let mut reversed: Vec<_> = input.iter().rev().cloned().collect();
        let mut a = dedup_keep_max(std::mem::take(&mut input));
        let mut b = dedup_keep_max(std::mem::take(&mut reversed));
        sort_candidates(&mut a);
        sort_candidates(&mut b);
        prop_assert_eq!(a, b);
    }
}
