//! ragfuse-text
//!
//! Lexical retrieval path: a tantivy BM25 index over leaf chunks with the
//! directory filter pushed into the query, and the auto-merge step that
//! promotes retrieved sibling leaves to their parent chunk.

pub mod automerge;
pub mod index;
pub mod retriever;
pub mod tantivy_utils;

pub use automerge::AutoMerger;
pub use index::SparseIndex;
pub use retriever::SparseRetriever;
