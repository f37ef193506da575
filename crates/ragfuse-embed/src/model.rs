use anyhow::{anyhow, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::Config as XLMRobertaConfig;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::info;

/// Tokenizer, config and weights of an XLM-RoBERTa checkpoint directory.
pub struct Checkpoint {
    pub tokenizer: Tokenizer,
    pub config: XLMRobertaConfig,
    pub vb: VarBuilder<'static>,
}

/// Load `tokenizer.json`, `config.json` and either `model.safetensors` or
/// `pytorch_model.bin` from `model_dir`.
pub fn load_checkpoint(model_dir: &Path, device: &Device) -> Result<Checkpoint> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
    let config_path = model_dir.join("config.json");
    let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;

    let safetensors = model_dir.join("model.safetensors");
    let vb = if safetensors.exists() {
        info!(path = %safetensors.display(), "loading safetensors weights");
        // SAFETY: the weight file is not modified while mapped.
        unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? }
    } else {
        let weights_path = model_dir.join("pytorch_model.bin");
        info!(path = %weights_path.display(), "loading pickled weights");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: std::collections::HashMap<String, candle_core::Tensor> = weights.into_iter().collect();
        VarBuilder::from_tensors(weights_map, DType::F32, device)
    };
    Ok(Checkpoint { tokenizer, config, vb })
}

/// First existing directory among an explicit setting, `APP_MODEL_DIR`-style
/// env var `env_key`, and the conventional `models/<name>` locations.
pub fn resolve_model_dir(explicit: Option<&str>, env_key: &str, name: &str) -> Result<PathBuf> {
    if let Some(dir) = explicit { let p = ragfuse_core::config::expand_path(dir); if p.exists() { return Ok(p); } }
    if let Ok(dir) = std::env::var(env_key) { let p = PathBuf::from(&dir); if p.exists() { info!(dir = %p.display(), "using {}", env_key); return Ok(p); } }
    for candidate in [format!("../models/{}", name), format!("models/{}", name)] {
        let p = PathBuf::from(&candidate); if p.exists() { return Ok(p); }
    }
    Err(anyhow!("Could not locate model directory for '{}'", name))
}
