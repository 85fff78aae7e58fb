use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use waypoint_core::config::EmbeddingConfig;
use waypoint_core::traits::Embedder;
use waypoint_core::{Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{pad_token_id, tokenize_batch};

/// Sentence encoder over a BERT-family checkpoint: mean pooling + L2 normalisation.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    pad_id: u32,
    max_len: usize,
    batch_size: usize,
    dim: usize,
    id: String,
}

impl BertEmbedder {
    pub fn new(model_dir: &Path, cfg: &EmbeddingConfig) -> Result<Self> {
        let device = select_device(&cfg.device);
        info!(model = %cfg.model, dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Embedding(format!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e)))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).map_err(|e| Error::io(&config_path, e))?;
        let config: BertConfig = serde_json::from_str(&raw).map_err(|e| Error::Embedding(format!("{}: {}", config_path.display(), e)))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config).map_err(Error::embedding)?;

        let max_len = cfg.max_len.min(config.max_position_embeddings);
        let dim = config.hidden_size;
        let pad_id = pad_token_id(&tokenizer);
        let id = format!("bert:{}:d{}", cfg.model, dim);
        info!(dim, max_len, "sentence encoder ready");
        Ok(Self { model, tokenizer, device, pad_id, max_len, batch_size: cfg.batch_size.max(1), dim, id })
    }

    fn embed_chunk(&self, texts: &[String]) -> candle_core::Result<Vec<Vec<f32>>> {
        let batch = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = batch.input_ids.zeros_like()?;
        let hidden = self.model.forward(&batch.input_ids, &token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()
    }
}

impl Embedder for BertEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk).map_err(Error::embedding)?);
        }
        let elapsed = start.elapsed();
        debug!(texts = texts.len(), ms = elapsed.as_millis() as u64, "embedded batch");
        if texts.len() == 1 && elapsed.as_millis() > 500 { warn!("Slow embedding: {:?} for one text", elapsed); }
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        debug!(file = %safetensors.display(), "loading safetensors weights");
        return candle_core::safetensors::load(&safetensors, device).map_err(Error::embedding);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        debug!(file = %pickle.display(), "loading pytorch weights");
        let weights = candle_core::pickle::read_all(&pickle).map_err(Error::embedding)?;
        return weights
            .into_iter()
            .map(|(name, t)| t.to_device(device).map(|t| (name, t)))
            .collect::<candle_core::Result<HashMap<_, _>>>()
            .map_err(Error::embedding);
    }
    Err(Error::Embedding(format!("no model.safetensors or pytorch_model.bin in {}", model_dir.display())))
}

/// Locate the model directory: config value, then `APP_MODEL_DIR`, `MODEL_DIR`, then `models/<name>`.
pub fn resolve_model_dir(cfg: &EmbeddingConfig, base_dir: &Path) -> Result<PathBuf> {
    if let Some(dir) = &cfg.model_dir {
        let p = waypoint_core::config::resolve_with_base(base_dir, dir);
        if p.exists() { return Ok(p); }
        return Err(Error::Embedding(format!("configured model_dir {} does not exist", p.display())));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { debug!("Using {}: {}", var, p.display()); return Ok(p); }
        }
    }
    let name = cfg.model.rsplit('/').next().unwrap_or(&cfg.model);
    let local = base_dir.join("models").join(name);
    if local.exists() { return Ok(local); }
    Err(Error::Embedding(format!("Could not locate model directory for '{}' (set embedding.model_dir or APP_MODEL_DIR)", cfg.model)))
}
