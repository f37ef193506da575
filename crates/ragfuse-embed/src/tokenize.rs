use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use tokenizers::{EncodeInput, Tokenizer};

/// XLM-RoBERTa `<pad>` id.
pub const PAD_ID: u32 = 1;

/// Model inputs for one batch, padded to the longest sequence.
pub struct BatchInputs {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Encode `inputs`, cap each sequence at `max_len` (keeping its final special
/// token) and right-pad to the batch maximum.
pub fn encode_batch<'s, E>(tokenizer: &Tokenizer, inputs: Vec<E>, max_len: usize, device: &Device) -> Result<BatchInputs>
where
    E: Into<EncodeInput<'s>>,
{
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let enc = tokenizer.encode(input, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len && max_len > 1 {
            let last = ids[ids.len() - 1];
            ids.truncate(max_len - 1); ids.push(last);
            mask.truncate(max_len);
        }
        rows.push((ids, mask));
    }
    let batch = rows.len();
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut flat_ids = Vec::with_capacity(batch * width);
    let mut flat_mask = Vec::with_capacity(batch * width);
    for (mut ids, mut mask) in rows {
        ids.resize(width, PAD_ID);
        mask.resize(width, 0);
        flat_ids.extend(ids);
        flat_mask.extend(mask);
    }
    Ok(BatchInputs {
        input_ids: Tensor::from_vec(flat_ids, (batch, width), device)?,
        attention_mask: Tensor::from_vec(flat_mask, (batch, width), device)?,
        token_type_ids: Tensor::zeros((batch, width), DType::U32, device)?,
    })
}
