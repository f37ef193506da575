//! ragfuse-vector
//!
//! Dense retrieval path. `VectorIndex` implementations (LanceDB on disk,
//! brute force in memory), the `DenseRetriever` that embeds queries against
//! them, and the bootstrap that fills a collection from a corpus.

pub mod dense;
pub mod ingest;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use dense::DenseRetriever;
pub use ingest::{bootstrap_vectors, IngestOptions};
pub use lance::LanceVectorIndex;
pub use memory::InMemoryVectorIndex;
