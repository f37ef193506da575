//! Domain types used by the retrieval engines and the fusion pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key holding the top-level directory a chunk was ingested from.
pub const META_DIR: &str = "dir";
pub const META_FILE_PATH: &str = "file_path";
pub const META_TITLE: &str = "document_title";

/// An immutable unit of retrievable text.
///
/// - `id`: unique within a `CorpusIndex`
/// - `metadata`: at least `dir`, `file_path` and `document_title` for ingested chunks
/// - `parent`/`children`: id references forming a forest; leaves have no children
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
    #[serde(default)]
    pub parent: Option<ChunkId>,
    #[serde(default)]
    pub children: Vec<ChunkId>,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Meta::new(), parent: None, children: Vec::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<ChunkId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ChunkId>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn dir(&self) -> Option<&str> { self.metadata.get(META_DIR).map(String::as_str) }

    pub fn title(&self) -> Option<&str> { self.metadata.get(META_TITLE).map(String::as_str) }

    pub fn file_path(&self) -> Option<&str> { self.metadata.get(META_FILE_PATH).map(String::as_str) }

    pub fn is_leaf(&self) -> bool { self.children.is_empty() }

    /// Text sent to the embedding model: the document title prefixed to the body.
    pub fn embed_text(&self) -> String {
        match self.title() {
            Some(title) if !title.is_empty() => format!("{}: {}", title, self.text),
            _ => self.text.clone(),
        }
    }

    pub fn matches(&self, filter: Option<&MetadataFilter>) -> bool {
        filter.map_or(true, |f| f.matches(&self.metadata))
    }
}

/// Exact-match equality filter on one metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub key: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    pub fn dir(value: impl Into<String>) -> Self { Self::equals(META_DIR, value) }

    pub fn matches(&self, meta: &Meta) -> bool {
        meta.get(&self.key).is_some_and(|v| *v == self.value)
    }
}

/// Which step produced a score. Scores are only comparable within one provenance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Dense,
    Sparse,
    /// Weighted sum of normalized dense and sparse scores.
    Hybrid,
    /// Reciprocal rank fusion score.
    Fused,
    Reranked,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
            Self::Hybrid => "hybrid",
            Self::Fused => "fused",
            Self::Reranked => "reranked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub provenance: Provenance,
}

impl ScoredCandidate {
    pub fn new(chunk_id: impl Into<ChunkId>, score: f32, provenance: Provenance) -> Self {
        Self { chunk_id: chunk_id.into(), score, provenance }
    }
}

/// A user question plus the optional directory it is restricted to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub directory_filter: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into(), directory_filter: None } }

    pub fn with_directory(mut self, dir: impl Into<String>) -> Self {
        self.directory_filter = Some(dir.into());
        self
    }

    /// The filter every retrieval path must apply for this query.
    pub fn filter(&self) -> Option<MetadataFilter> {
        self.directory_filter.as_ref().map(MetadataFilter::dir)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Dense,
    Sparse,
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    #[default]
    SinglePass,
    FuseThenGenerate,
    GenerateBothPickLonger,
    GenerateBothConcatenate,
}

impl FusionStrategy {
    /// Strategies that retrieve and rerank dense and sparse independently.
    pub fn is_dual_path(self) -> bool { !matches!(self, Self::SinglePass) }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKind {
    #[default]
    None,
    CrossEncoder,
    Llm,
}

/// How a candidate is rendered into the generation context.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    #[default]
    Text,
    TitleText,
    /// Text surrounded by the previous and next sibling chunk.
    Neighbors,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineOutput {
    pub answer: String,
    pub candidates: Vec<ScoredCandidate>,
    pub contexts: Vec<String>,
}
