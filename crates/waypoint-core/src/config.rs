//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! (selected by `RUST_ENV`) and `APP_*` environment variables, where `__`
//! separates nested keys (`APP_RETRIEVAL__TOTAL_CHUNKS=3`). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against the directory
//! the configuration was loaded from.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DistanceMetric;

pub const DEFAULT_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

/// Parameters of the two-stage search. Fixed for a retriever's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub title_top_n: usize,
    pub chunks_per_title: usize,
    pub total_chunks: usize,
    pub max_distance: f32,
    /// Run the per-title chunk searches on the rayon pool.
    pub parallel: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { title_top_n: 10, chunks_per_title: 2, total_chunks: 5, max_distance: 1.0, parallel: false }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("title_top_n", self.title_top_n),
            ("chunks_per_title", self.chunks_per_title),
            ("total_chunks", self.total_chunks),
        ] {
            if value == 0 { return Err(Error::InvalidConfig(format!("retrieval.{name} must be at least 1"))); }
        }
        if !self.max_distance.is_finite() || self.max_distance < 0.0 {
            return Err(Error::InvalidConfig(format!("retrieval.max_distance must be a finite non-negative number, got {}", self.max_distance)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model identifier, recorded in every index built with it.
    pub model: String,
    /// Directory holding `config.json`, `tokenizer.json` and the weights.
    pub model_dir: Option<String>,
    /// `cpu`, `metal` or `cuda`.
    pub device: String,
    /// Maximum tokens per input; longer inputs are truncated.
    pub max_len: usize,
    pub batch_size: usize,
    pub use_fake: bool,
    pub fake_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            model_dir: None,
            device: "cpu".to_string(),
            max_len: 128,
            batch_size: 32,
            use_fake: false,
            fake_dim: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub title_path: Option<String>,
    pub chunk_path: Option<String>,
    pub metric: DistanceMetric,
    /// Rebuild from the corpus even when persisted indices exist.
    pub force_rebuild: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            title_path: Some("indexes/titles.wpi".to_string()),
            chunk_path: Some("indexes/chunks.wpi".to_string()),
            metric: DistanceMetric::default(),
            force_rebuild: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub data_dir: String,
    /// Chunks must be strictly shorter than this many characters.
    pub max_chunk_chars: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self { Self { data_dir: "data".to_string(), max_chunk_chars: 2000 } }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub corpus: CorpusConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        if self.embedding.batch_size == 0 { return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into())); }
        if self.embedding.max_len == 0 { return Err(Error::InvalidConfig("embedding.max_len must be at least 1".into())); }
        if self.corpus.max_chunk_chars == 0 { return Err(Error::InvalidConfig("corpus.max_chunk_chars must be at least 1".into())); }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| Error::io(".", e))?;
        Self::load_from(&cwd)
    }

    /// Load `config.toml` and `config.<env>.toml` from `dir`, then `APP_*` variables.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    /// Wrap an explicit figment; relative paths resolve against `base_dir`.
    pub fn from_figment(figment: Figment, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment, base_dir: base_dir.into() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The typed, validated settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }

    pub fn resolve(&self, p: &str) -> PathBuf { resolve_with_base(&self.base_dir, p) }
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
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
