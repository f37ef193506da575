//! ragfuse-embed
//!
//! Candle-backed XLM-RoBERTa models for the two model-driven collaborators:
//! the dense embedder (mean pooled, L2 normalized) and the cross-encoder
//! pair scorer. `APP_USE_FAKE_EMBEDDINGS=1` swaps both for fast
//! deterministic stand-ins.

use anyhow::Result;
use candle_core::Device;
use candle_transformers::models::xlm_roberta::XLMRobertaModel;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use ragfuse_core::config::EmbeddingConfig;
use ragfuse_core::traits::{Embedder, PairScorer};

pub mod cross_encoder;
pub mod device;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use cross_encoder::CrossEncoder;
pub use pool::masked_mean_l2;

pub struct CandleEmbedder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, batch_size: usize }

impl CandleEmbedder {
    pub fn new(model_dir: &Path, cfg: &EmbeddingConfig) -> Result<Self> {
        let device = device::select_device();
        let ckpt = model::load_checkpoint(model_dir, &device)?;
        let model = XLMRobertaModel::new(&ckpt.config, ckpt.vb)?;
        info!(dir = %model_dir.display(), dim = cfg.dim, "embedding model loaded");
        Ok(Self { model, tokenizer: ckpt.tokenizer, device, dim: cfg.dim, max_len: cfg.max_len, batch_size: cfg.batch_size.max(1) })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs = tokenize::encode_batch(&self.tokenizer, texts.iter().map(String::as_str).collect(), self.max_len, &self.device)?;
        let hidden = self.model.forward(&inputs.input_ids, &inputs.attention_mask, &inputs.token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &inputs.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        anyhow::ensure!(rows.iter().all(|r| r.len() == self.dim), "model output dim differs from configured dim {}", self.dim);
        Ok(rows)
    }
}

impl Embedder for CandleEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) { out.extend(self.embed_chunk(chunk)?); }
        if start.elapsed().as_millis() > 1000 { debug!(n = texts.len(), ms = start.elapsed().as_millis() as u64, "slow embedding batch"); }
        Ok(out)
    }
}

/// Hashes whitespace tokens into buckets; identical text gives identical vectors.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace().map(str::to_lowercase) {
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

/// Fraction of distinct query words present in the text.
pub struct FakePairScorer;

impl PairScorer for FakePairScorer {
    fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let q: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if q.is_empty() { return Ok(vec![0.0; texts.len()]); }
        Ok(texts.iter().map(|t| {
            let words: HashSet<String> = t.split_whitespace().map(str::to_lowercase).collect();
            q.iter().filter(|w| words.contains(*w)).count() as f32 / q.len() as f32
        }).collect())
    }
}

pub fn use_fake_models() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(cfg: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if use_fake_models() { warn!("using FakeEmbedder"); return Ok(Arc::new(FakeEmbedder::new(cfg.dim))); }
    let dir = model::resolve_model_dir(cfg.model_dir.as_deref(), "APP_MODEL_DIR", "bge-m3")?;
    Ok(Arc::new(CandleEmbedder::new(&dir, cfg)?))
}

pub fn get_default_pair_scorer(model_dir: Option<&str>, max_len: usize) -> Result<Arc<dyn PairScorer>> {
    if use_fake_models() { warn!("using FakePairScorer"); return Ok(Arc::new(FakePairScorer)); }
    let dir = model::resolve_model_dir(model_dir, "APP_RERANKER_DIR", "bge-reranker-v2-m3")?;
    Ok(Arc::new(CrossEncoder::new(&dir, max_len)?))
}
