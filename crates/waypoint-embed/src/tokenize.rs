use candle_core::{Device, Result, Tensor};
use tokenizers::Tokenizer;

/// Token ids and attention mask for a batch, padded to the longest (truncated) input.
pub struct BatchEncoding {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
}

pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, pad_id: u32, device: &Device) -> Result<BatchEncoding> {
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| candle_core::Error::Msg(format!("Tokenization failed: {}", e)))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        rows.push((ids, mask));
    }
    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);

    let mut flat_ids = Vec::with_capacity(rows.len() * seq_len);
    let mut flat_mask = Vec::with_capacity(rows.len() * seq_len);
    for (ids, mask) in rows {
        let pad = seq_len - ids.len();
        flat_ids.extend(ids.into_iter().chain(std::iter::repeat(pad_id).take(pad)));
        flat_mask.extend(mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let input_ids = Tensor::from_vec(flat_ids, (texts.len(), seq_len), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (texts.len(), seq_len), device)?;
    Ok(BatchEncoding { input_ids, attention_mask })
}

/// Padding token id of `tokenizer`, falling back to the common BERT/XLM-R names.
pub fn pad_token_id(tokenizer: &Tokenizer) -> u32 {
    if let Some(params) = tokenizer.get_padding() { return params.pad_id; }
    ["<pad>", "[PAD]"].iter().find_map(|t| tokenizer.token_to_id(t)).unwrap_or(0)
}
