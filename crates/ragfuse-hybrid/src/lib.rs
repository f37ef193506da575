//! ragfuse-hybrid
//!
//! Combining the dense and sparse paths: the mode-driven `HybridRetriever`
//! (weighted sum of normalized scores, degrading to one path when the other
//! is down) and reciprocal rank fusion over independently ranked lists.

pub mod combiner;
pub mod fusion;
pub mod timeout;

pub use combiner::{min_max_normalize, HybridRetriever};
pub use fusion::{reciprocal_rank_fusion, DEFAULT_RANK_CONSTANT};
pub use timeout::bounded;
