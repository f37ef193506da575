use thiserror::Error;

use crate::types::Provenance;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A retrieval path (vector index or lexical index) could not serve the request.
    #[error("{path} retrieval unavailable: {reason}")]
    RetrievalUnavailable { path: Provenance, reason: String },

    #[error("Reranker unavailable: {0}")]
    RerankUnavailable(String),

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn retrieval(path: Provenance, reason: impl std::fmt::Display) -> Self {
        Self::RetrievalUnavailable { path, reason: reason.to_string() }
    }

    pub fn is_retrieval_unavailable(&self) -> bool {
        matches!(self, Self::RetrievalUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
