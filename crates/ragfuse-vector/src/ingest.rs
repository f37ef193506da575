//! Vector bootstrap: embed every chunk of a corpus and upsert it into the
//! vector index, once.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::info;

use ragfuse_core::traits::{Embedder, VectorIndex, VectorPoint};
use ragfuse_core::CorpusIndex;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Clear the collection before embedding.
    pub reindex: bool,
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self { Self { batch_size: 128, reindex: false, show_progress: true } }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible { return ProgressBar::hidden(); }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Returns the number of chunks embedded; 0 when the collection was already
/// populated and `reindex` is off.
pub async fn bootstrap_vectors(corpus: &CorpusIndex, embedder: Arc<dyn Embedder>, index: &dyn VectorIndex, opts: &IngestOptions) -> Result<usize> {
    if opts.reindex {
        index.delete_collection().await?;
    }
    index.create_collection().await?;
    let existing = index.count().await?;
    if existing > 0 && !opts.reindex {
        info!(existing, "vector collection already populated; skipping embedding");
        return Ok(0);
    }
    if corpus.is_empty() { return Ok(0); }

    let chunks: Vec<_> = corpus.iter().collect();
    let pb = progress_bar(chunks.len() as u64, opts.show_progress);
    let mut embedded = 0usize;
    for batch in chunks.chunks(opts.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.embed_text()).collect();
        let worker = Arc::clone(&embedder);
        let vectors = tokio::task::spawn_blocking(move || worker.embed_batch(&texts)).await??;
        anyhow::ensure!(vectors.len() == batch.len(), "embedder returned {} vectors for {} texts", vectors.len(), batch.len());
        let points: Vec<VectorPoint> = batch
            .iter()
            .zip(vectors)
            .map(|(c, vector)| VectorPoint { id: c.id.clone(), vector, metadata: c.metadata.clone() })
            .collect();
        index.upsert(&points).await?;
        embedded += points.len();
        pb.set_position(embedded as u64);
    }
    pb.finish_with_message("done");
    info!(embedded, "vector bootstrap complete");
    Ok(embedded)
}
