//! Arena of chunks addressed by id.
//!
//! Parent/child links are stored as ids on each `Chunk`; the arena only
//! validates them and answers navigation queries. Nothing here is mutated
//! after construction, so a `CorpusIndex` is shared across requests behind
//! an `Arc` without locking.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId};

#[derive(Debug, Default)]
pub struct CorpusIndex {
    chunks: Vec<Chunk>,
    by_id: HashMap<ChunkId, usize>,
}

impl CorpusIndex {
    /// Build the arena, rejecting duplicate ids and dangling or inconsistent links.
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(chunks.len());
        for (i, c) in chunks.iter().enumerate() {
            if by_id.insert(c.id.clone(), i).is_some() {
                return Err(Error::InvalidCorpus(format!("duplicate chunk id '{}'", c.id)));
            }
        }
        for c in &chunks {
            if let Some(parent_id) = &c.parent {
                let parent = by_id.get(parent_id).map(|&i| &chunks[i]).ok_or_else(|| {
                    Error::InvalidCorpus(format!("chunk '{}' references missing parent '{}'", c.id, parent_id))
                })?;
                if !parent.children.iter().any(|id| *id == c.id) {
                    return Err(Error::InvalidCorpus(format!("parent '{}' does not list child '{}'", parent_id, c.id)));
                }
            }
            for child_id in &c.children {
                let child = by_id.get(child_id).map(|&i| &chunks[i]).ok_or_else(|| {
                    Error::InvalidCorpus(format!("chunk '{}' references missing child '{}'", c.id, child_id))
                })?;
                if child.parent.as_deref() != Some(c.id.as_str()) {
                    return Err(Error::InvalidCorpus(format!("child '{}' does not point back to '{}'", child_id, c.id)));
                }
            }
        }
        Ok(Self { chunks, by_id })
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn get(&self, id: &str) -> Option<&Chunk> { self.by_id.get(id).map(|&i| &self.chunks[i]) }

    pub fn require(&self, id: &str) -> Result<&Chunk> {
        self.get(id).ok_or_else(|| Error::NotFound(format!("chunk '{}'", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> { self.chunks.iter() }

    /// Chunks without children; these are what the lexical index sees.
    pub fn leaves(&self) -> impl Iterator<Item = &Chunk> { self.chunks.iter().filter(|c| c.is_leaf()) }

    pub fn has_hierarchy(&self) -> bool { self.chunks.iter().any(|c| c.parent.is_some()) }

    pub fn parent_of(&self, id: &str) -> Option<&Chunk> {
        self.get(id).and_then(|c| c.parent.as_deref()).and_then(|p| self.get(p))
    }

    pub fn children_of(&self, id: &str) -> Vec<&Chunk> {
        self.get(id).map(|c| c.children.iter().filter_map(|ch| self.get(ch)).collect()).unwrap_or_default()
    }

    /// Previous and next chunk at the same level of the same document.
    ///
    /// For a child this is its parent's child list; for a root it is the
    /// sequence of roots that share its `file_path`, in arena order.
    pub fn neighbors(&self, id: &str) -> (Option<&Chunk>, Option<&Chunk>) {
        let Some(chunk) = self.get(id) else { return (None, None) };
        let siblings: Vec<&Chunk> = match self.parent_of(id) {
            Some(parent) => parent.children.iter().filter_map(|c| self.get(c)).collect(),
            None => self
                .chunks
                .iter()
                .filter(|c| c.parent.is_none() && c.file_path().is_some() && c.file_path() == chunk.file_path())
                .collect(),
        };
        let Some(pos) = siblings.iter().position(|c| c.id == chunk.id) else { return (None, None) };
        let prev = pos.checked_sub(1).and_then(|p| siblings.get(p).copied());
        let next = siblings.get(pos + 1).copied();
        (prev, next)
    }
}
