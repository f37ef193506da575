//! Loading configuration, corpus and collaborators for the CLI commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use ragfuse_core::config::{resolve_with_base, Config, DataConfig, EmbeddingConfig, LlmConfig, PipelineConfig};
use ragfuse_core::data_processor::DataProcessor;
use ragfuse_core::traits::{Embedder, Generator, VectorIndex};
use ragfuse_core::types::{FusionStrategy, RerankerKind, RetrievalMode};
use ragfuse_core::CorpusIndex;
use ragfuse_embed::{get_default_embedder, get_default_pair_scorer};
use ragfuse_pipeline::{Components, OpenAiGenerator};
use ragfuse_text::tantivy_utils::{default_stop_words, load_stop_words};
use ragfuse_vector::LanceVectorIndex;

pub struct Settings {
    pub base: PathBuf,
    pub data: DataConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

impl Settings {
    pub fn from_config(config: &Config, base: &Path) -> Result<Self> {
        Ok(Self {
            base: base.to_path_buf(),
            data: config.section("data")?,
            embedding: config.section("embedding")?,
            llm: config.section("llm")?,
            pipeline: config.pipeline()?,
        })
    }

    pub fn data_dir(&self) -> PathBuf { resolve_with_base(&self.base, &self.data.data_dir) }

    pub fn lancedb_dir(&self) -> PathBuf { resolve_with_base(&self.base, &self.data.lancedb_dir) }

    pub fn stop_words(&self) -> Result<Vec<String>> {
        match &self.data.stopwords_path {
            Some(p) => load_stop_words(&resolve_with_base(&self.base, p)),
            None => Ok(default_stop_words()),
        }
    }

    fn needs_dense(&self) -> bool {
        self.pipeline.fusion_strategy != FusionStrategy::SinglePass || self.pipeline.retrieval_mode != RetrievalMode::Sparse
    }

    fn needs_generator(&self) -> bool {
        !self.pipeline.retrieval_only || self.pipeline.reranker.kind == RerankerKind::Llm
    }
}

/// Chunk the data directory into a validated corpus.
pub fn load_corpus(settings: &Settings, limit: Option<usize>) -> Result<Arc<CorpusIndex>> {
    let data_dir = settings.data_dir();
    let processor = DataProcessor::with_config(settings.data.chunking.clone());
    let chunks = match limit {
        Some(n) => processor.process_directory_limited(&data_dir, n)?,
        None => processor.process_directory(&data_dir)?,
    };
    let corpus = CorpusIndex::new(chunks).with_context(|| format!("invalid corpus under {}", data_dir.display()))?;
    info!(chunks = corpus.len(), dir = %data_dir.display(), "corpus loaded");
    Ok(Arc::new(corpus))
}

pub async fn open_vector_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    let uri = settings.lancedb_dir();
    std::fs::create_dir_all(&uri).with_context(|| format!("creating {}", uri.display()))?;
    let index = LanceVectorIndex::open(&uri.to_string_lossy(), &settings.data.collection, settings.embedding.dim).await?;
    Ok(Arc::new(index))
}

pub fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> { get_default_embedder(&settings.embedding) }

/// Collaborators for the configured pipeline; only what the configuration uses is loaded.
pub async fn build_components(settings: &Settings, corpus: Arc<CorpusIndex>) -> Result<Components> {
    let (embedder, vector_index) = if settings.needs_dense() {
        (Some(load_embedder(settings)?), Some(open_vector_index(settings).await?))
    } else {
        (None, None)
    };
    let pair_scorer = if settings.pipeline.reranker.kind == RerankerKind::CrossEncoder {
        Some(get_default_pair_scorer(settings.pipeline.reranker.model_dir.as_deref(), settings.embedding.max_len)?)
    } else {
        None
    };
    let generator: Option<Arc<dyn Generator>> =
        if settings.needs_generator() { Some(Arc::new(OpenAiGenerator::new(&settings.llm)?)) } else { None };
    Ok(Components { corpus, stop_words: settings.stop_words()?, embedder, vector_index, pair_scorer, generator })
}
