use std::path::Path;

use waypoint_core::config::EmbeddingConfig;
use waypoint_embed::{embedder_from_config, resolve_model_dir, FakeEmbedder};
use waypoint_core::traits::Embedder;

fn fake_cfg(dim: usize) -> EmbeddingConfig {
    EmbeddingConfig { use_fake: true, fake_dim: dim, ..EmbeddingConfig::default() }
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = embedder_from_config(&fake_cfg(384), Path::new(".")).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), 384);
    assert_eq!(embedder.dim(), 384);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn embed_one_matches_batch() {
    let e = FakeEmbedder::new(32);
    let one = e.embed_one("Louvre museum").unwrap();
    let batch = e.embed_batch(&["Louvre museum".to_string()]).unwrap();
    assert_eq!(one, batch[0]);
}

#[test]
fn batch_preserves_order() {
    let e = FakeEmbedder::new(32);
    let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
    let out = e.embed_batch(&texts).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[1], e.embed_text("beta"));
    assert_eq!(out[2], e.embed_text("gamma"));
}

#[test]
fn missing_model_dir_is_an_embedding_error() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = EmbeddingConfig { model_dir: Some("no/such/dir".into()), ..EmbeddingConfig::default() };
    let err = resolve_model_dir(&cfg, tmp.path()).unwrap_err();
    assert!(matches!(err, waypoint_core::Error::Embedding(_)), "{err}");
}

#[test]
fn model_dir_found_under_models() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("models").join("paraphrase-multilingual-MiniLM-L12-v2");
    std::fs::create_dir_all(&dir).unwrap();
    let cfg = EmbeddingConfig::default();
    // APP_MODEL_DIR / MODEL_DIR take precedence when set in the environment
    if std::env::var("APP_MODEL_DIR").is_err() && std::env::var("MODEL_DIR").is_err() {
        assert_eq!(resolve_model_dir(&cfg, tmp.path()).unwrap(), dir);
    }
}

#[test]
#[ignore = "requires a local sentence-transformers checkpoint in APP_MODEL_DIR"]
fn bert_embedder_produces_normalised_vectors() {
    let cfg = EmbeddingConfig::default();
    let embedder = embedder_from_config(&cfg, Path::new(".")).expect("model");
    let out = embedder.embed_batch(&["founding of Paris".to_string(), "Основание Парижа".to_string()]).unwrap();
    assert_eq!(out[0].len(), embedder.dim());
    let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-3);
}
