//! ragfuse-core
//!
//! Domain types, error kinds, collaborator traits and the chunk arena shared
//! by the dense, sparse, rerank and fusion crates.

pub mod config;
pub mod corpus;
pub mod data_processor;
pub mod error;
pub mod ranking;
pub mod traits;
pub mod types;

pub use corpus::CorpusIndex;
pub use error::{Error, Result};
