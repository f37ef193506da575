//! Configuration loader, typed sections and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys use `__`, e.g. `APP_PIPELINE__FUSION_STRATEGY`). Sections that
//! are absent fall back to their `Default`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data_processor::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{ContextMode, FusionStrategy, RerankerKind, RetrievalMode};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like `get`, but a missing key yields `T::default()`.
    pub fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("section '{}': {}", key, e)))
    }

    pub fn pipeline(&self) -> Result<PipelineConfig> {
        let cfg: PipelineConfig = self.section("pipeline")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval_mode: RetrievalMode,
    pub fusion_strategy: FusionStrategy,
    pub dense_top_k: usize,
    pub sparse_top_k: usize,
    pub hybrid_top_k: usize,
    pub dense_weight: f32,
    pub sparse_weight: f32,
    /// Fraction of a parent's children that must be retrieved to merge them.
    /// `None` disables auto-merge.
    pub merge_ratio: Option<f32>,
    pub rank_constant: f32,
    pub fusion_top_k: usize,
    pub reranker: RerankerConfig,
    pub context_mode: ContextMode,
    pub retrieval_only: bool,
    /// When set, an empty candidate list skips generation and returns this text.
    pub empty_context_answer: Option<String>,
    pub timeouts: TimeoutConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_mode: RetrievalMode::Hybrid,
            fusion_strategy: FusionStrategy::SinglePass,
            dense_top_k: 288,
            sparse_top_k: 192,
            hybrid_top_k: 256,
            dense_weight: 0.5,
            sparse_weight: 0.5,
            merge_ratio: Some(0.4),
            rank_constant: 60.0,
            fusion_top_k: 6,
            reranker: RerankerConfig::default(),
            context_mode: ContextMode::Text,
            retrieval_only: false,
            empty_context_answer: None,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dense_top_k", self.dense_top_k),
            ("sparse_top_k", self.sparse_top_k),
            ("hybrid_top_k", self.hybrid_top_k),
            ("fusion_top_k", self.fusion_top_k),
        ];
        for (name, v) in positive {
            if v == 0 { return Err(Error::InvalidConfig(format!("{} must be > 0", name))); }
        }
        if !(self.dense_weight >= 0.0 && self.sparse_weight >= 0.0) {
            return Err(Error::InvalidConfig("hybrid weights must be non-negative".into()));
        }
        if self.retrieval_mode == RetrievalMode::Hybrid && self.dense_weight + self.sparse_weight <= 0.0 {
            return Err(Error::InvalidConfig("hybrid mode needs a positive dense or sparse weight".into()));
        }
        if let Some(r) = self.merge_ratio {
            if !(r > 0.0 && r <= 1.0) { return Err(Error::InvalidConfig(format!("merge_ratio {} outside (0, 1]", r))); }
        }
        if !(self.rank_constant > 0.0) {
            return Err(Error::InvalidConfig("rank_constant must be > 0".into()));
        }
        self.reranker.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankerConfig {
    pub kind: RerankerKind,
    pub top_n: usize,
    pub batch_size: usize,
    /// Return the unreranked order (truncated to `top_n`) instead of failing
    /// when the reranking model is unreachable.
    pub fallback_on_error: bool,
    pub model_dir: Option<String>,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self { kind: RerankerKind::None, top_n: 6, batch_size: 32, fallback_on_error: false, model_dir: None }
    }
}

impl RerankerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kind == RerankerKind::None { return Ok(()); }
        if self.top_n == 0 { return Err(Error::InvalidConfig("reranker.top_n must be > 0".into())); }
        if self.batch_size == 0 { return Err(Error::InvalidConfig("reranker.batch_size must be > 0".into())); }
        Ok(())
    }
}

/// Per-call timeouts in milliseconds. `None` means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub retrieval_ms: Option<u64>,
    pub rerank_ms: Option<u64>,
    pub generation_ms: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self { Self { retrieval_ms: Some(30_000), rerank_ms: Some(60_000), generation_ms: Some(120_000) } }
}

impl TimeoutConfig {
    pub fn retrieval(&self) -> Option<Duration> { self.retrieval_ms.map(Duration::from_millis) }
    pub fn rerank(&self) -> Option<Duration> { self.rerank_ms.map(Duration::from_millis) }
    pub fn generation(&self) -> Option<Duration> { self.generation_ms.map(Duration::from_millis) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: String,
    pub lancedb_dir: String,
    pub collection: String,
    pub stopwords_path: Option<String>,
    pub chunking: ChunkingConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/txt".to_string(),
            lancedb_dir: "cache/lancedb".to_string(),
            collection: "chunks".to_string(),
            stopwords_path: None,
            chunking: ChunkingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self { Self { model_dir: None, dim: 1024, max_len: 512, batch_size: 128 } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
