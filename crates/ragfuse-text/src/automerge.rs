//! Promote sibling leaves to their parent when enough of them are retrieved.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use ragfuse_core::error::{Error, Result};
use ragfuse_core::ranking::{dedup_keep_max, sort_candidates};
use ragfuse_core::types::{MetadataFilter, ScoredCandidate};
use ragfuse_core::CorpusIndex;

pub struct AutoMerger {
    corpus: Arc<CorpusIndex>,
    ratio: f32,
}

impl AutoMerger {
    /// `ratio` is the fraction of a parent's children that must be present,
    /// compared with `>=`.
    pub fn new(corpus: Arc<CorpusIndex>, ratio: f32) -> Result<Self> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!("merge ratio {} outside (0, 1]", ratio)));
        }
        Ok(Self { corpus, ratio })
    }

    pub fn ratio(&self) -> f32 { self.ratio }

    /// Merge until no parent qualifies. The merged candidate scores the max of
    /// the candidates it replaces. Parents outside `filter` are never introduced.
    pub fn merge(&self, candidates: Vec<ScoredCandidate>, filter: Option<&MetadataFilter>) -> Vec<ScoredCandidate> {
        let mut current = dedup_keep_max(candidates);
        sort_candidates(&mut current);
        loop {
            let (next, changed) = self.merge_pass(current, filter);
            current = next;
            if !changed { return current; }
        }
    }

    fn merge_pass(&self, candidates: Vec<ScoredCandidate>, filter: Option<&MetadataFilter>) -> (Vec<ScoredCandidate>, bool) {
        let mut by_parent: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, c) in candidates.iter().enumerate() {
            if let Some(parent) = self.corpus.get(&c.chunk_id).and_then(|ch| ch.parent.as_deref()) {
                by_parent.entry(parent).or_default().push(i);
            }
        }

        let mut replaced: HashSet<usize> = HashSet::new();
        let mut promoted: Vec<ScoredCandidate> = Vec::new();
        for (parent_id, idxs) in &by_parent {
            let Some(parent) = self.corpus.get(parent_id) else { continue };
            if parent.children.is_empty() || !parent.matches(filter) { continue; }
            let present = idxs.len() as f32 / parent.children.len() as f32;
            if present < self.ratio { continue; }
            let best = idxs.iter().map(|&i| &candidates[i]).max_by(|a, b| a.score.total_cmp(&b.score));
            let Some(best) = best else { continue };
            debug!(parent = %parent_id, children = idxs.len(), of = parent.children.len(), "auto-merge");
            promoted.push(ScoredCandidate::new(parent.id.clone(), best.score, best.provenance));
            replaced.extend(idxs.iter().copied());
        }
        if promoted.is_empty() { return (candidates, false); }

        let kept = candidates.into_iter().enumerate().filter(|(i, _)| !replaced.contains(i)).map(|(_, c)| c);
        let mut out = dedup_keep_max(kept.chain(promoted).collect());
        sort_candidates(&mut out);
        (out, true)
    }
}
