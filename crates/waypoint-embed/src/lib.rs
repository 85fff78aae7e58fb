//! Sentence embedders: a candle BERT encoder and a hash-based fake for tests.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use waypoint_core::config::EmbeddingConfig;
use waypoint_core::traits::Embedder;
use waypoint_core::Result;

pub mod bert;
pub mod device;
pub mod fake;
pub mod pool;
pub mod tokenize;

pub use bert::{resolve_model_dir, BertEmbedder};
pub use device::select_device;
pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::{tokenize_batch, BatchEncoding};

/// `APP_USE_FAKE_EMBEDDINGS=1|true` forces the fake embedder regardless of config.
pub fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn embedder_from_config(cfg: &EmbeddingConfig, base_dir: &Path) -> Result<Arc<dyn Embedder>> {
    if cfg.use_fake || fake_requested_by_env() {
        info!(dim = cfg.fake_dim, "Using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(cfg.fake_dim)));
    }
    let dir = resolve_model_dir(cfg, base_dir)?;
    Ok(Arc::new(BertEmbedder::new(&dir, cfg)?))
}
