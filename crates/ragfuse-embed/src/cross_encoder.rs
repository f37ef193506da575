//! XLM-RoBERTa sequence-classification cross-encoder (bge-reranker family).

use anyhow::Result;
use candle_core::{DType, Device};
use candle_transformers::models::xlm_roberta::XLMRobertaForSequenceClassification;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

use ragfuse_core::traits::PairScorer;

use crate::device::select_device;
use crate::model::load_checkpoint;
use crate::tokenize::encode_batch;

pub struct CrossEncoder { model: XLMRobertaForSequenceClassification, tokenizer: Tokenizer, device: Device, max_len: usize }

impl CrossEncoder {
    pub fn new(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        let ckpt = load_checkpoint(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &ckpt.config, ckpt.vb)?;
        info!(dir = %model_dir.display(), "cross-encoder loaded");
        Ok(Self { model, tokenizer: ckpt.tokenizer, device, max_len })
    }
}

impl PairScorer for CrossEncoder {
    /// Sigmoid relevance of each `(query, text)` pair, in input order.
    fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let pairs: Vec<(&str, &str)> = texts.iter().map(|t| (query, t.as_str())).collect();
        let inputs = encode_batch(&self.tokenizer, pairs, self.max_len, &self.device)?;
        let logits = self.model.forward(&inputs.input_ids, &inputs.attention_mask, &inputs.token_type_ids)?;
        let logits = logits.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(logits.into_iter().map(|x| 1.0 / (1.0 + (-x).exp())).collect())
    }
}
