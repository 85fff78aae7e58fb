use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use waypoint_core::config::{resolve_with_base, IndexConfig, RetrievalConfig, Settings};
use waypoint_core::traits::{Embedder, PersistentIndex, VectorIndex};
use waypoint_core::types::{DistanceMetric, MetadataFilter, SearchHit, Title};
use waypoint_core::{Corpus, Error, Result};
use waypoint_vector::FlatIndex;

use crate::records::{chunk_records, title_records};

/// A passage chosen by the retriever, with its owning title. Lower distance is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub title: Title,
    pub distance: f32,
}

/// Where the title and chunk indices are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub title: PathBuf,
    pub chunk: PathBuf,
}

impl IndexPaths {
    /// `None` unless both paths are configured.
    pub fn from_config(cfg: &IndexConfig, base_dir: &Path) -> Option<Self> {
        match (&cfg.title_path, &cfg.chunk_path) {
            (Some(t), Some(c)) => Some(Self { title: resolve_with_base(base_dir, t), chunk: resolve_with_base(base_dir, c) }),
            _ => None,
        }
    }

    pub fn exist(&self) -> bool { self.title.exists() && self.chunk.exists() }

    fn first_missing(&self) -> &Path {
        if self.title.exists() { &self.chunk } else { &self.title }
    }
}

/// A freshly built title/chunk index pair, not yet installed in a retriever.
pub struct IndexPair<I> {
    pub title: I,
    pub chunk: I,
}

impl<I: PersistentIndex> IndexPair<I> {
    pub fn build(corpus: &Corpus, embedder: Arc<dyn Embedder>, metric: DistanceMetric) -> Result<Self> {
        if corpus.is_empty() { return Err(Error::EmptyInput("corpus has no titles with chunks".into())); }
        let start = Instant::now();
        let build_id = corpus.fingerprint();
        let title = I::build(&title_records(corpus), embedder.clone(), metric)?.with_build_id(build_id.clone());
        let chunk = I::build(&chunk_records(corpus), embedder, metric)?.with_build_id(build_id);
        info!(titles = title.len(), chunks = chunk.len(), ms = start.elapsed().as_millis() as u64, "built title and chunk indices");
        Ok(Self { title, chunk })
    }

    /// Load both indices and check that they were written by the same build with the same metric.
    pub fn load(paths: &IndexPaths, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let title = I::load(&paths.title, embedder.clone())?;
        let chunk = I::load(&paths.chunk, embedder)?;
        if title.build_id() != chunk.build_id() {
            return Err(Error::IncompatibleIndex {
                path: paths.chunk.clone(),
                reason: format!(
                    "chunk index is from build {}, title index from build {}; rebuild both",
                    chunk.build_id().unwrap_or("<none>"),
                    title.build_id().unwrap_or("<none>"),
                ),
            });
        }
        if title.metric() != chunk.metric() {
            return Err(Error::IncompatibleIndex {
                path: paths.chunk.clone(),
                reason: format!("chunk index uses {:?}, title index uses {:?}", chunk.metric(), title.metric()),
            });
        }
        Ok(Self { title, chunk })
    }

    pub fn metric(&self) -> DistanceMetric { self.title.metric() }

    pub fn persist(&self, paths: &IndexPaths) -> Result<()> {
        self.title.persist(&paths.title)?;
        self.chunk.persist(&paths.chunk)
    }
}

pub struct HierarchicalRetriever<I: PersistentIndex = FlatIndex> {
    title_index: I,
    chunk_index: I,
    config: RetrievalConfig,
    embedder: Arc<dyn Embedder>,
    metric: DistanceMetric,
    paths: Option<IndexPaths>,
    corpus: Option<Corpus>,
}

impl<I: PersistentIndex> HierarchicalRetriever<I> {
    pub fn build(corpus: Corpus, config: RetrievalConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::build_with_metric(corpus, config, embedder, DistanceMetric::default())
    }

    pub fn build_with_metric(corpus: Corpus, config: RetrievalConfig, embedder: Arc<dyn Embedder>, metric: DistanceMetric) -> Result<Self> {
        config.validate()?;
        let pair = IndexPair::build(&corpus, embedder.clone(), metric)?;
        Ok(Self::from_parts(pair, config, embedder, metric, None, Some(corpus)))
    }

    /// Load persisted indices when both exist (and no rebuild is forced); otherwise build
    /// from `corpus` and persist the result to the configured paths. Loaded indices
    /// keep the metric they were built with, whatever `index.metric` says.
    pub fn open(settings: &Settings, base_dir: &Path, embedder: Arc<dyn Embedder>, corpus: Option<Corpus>) -> Result<Self> {
        settings.retrieval.validate()?;
        let paths = IndexPaths::from_config(&settings.index, base_dir);
        let metric = settings.index.metric;

        if let Some(p) = paths.as_ref().filter(|p| !settings.index.force_rebuild && p.exist()) {
            info!(titles = %p.title.display(), chunks = %p.chunk.display(), "loading persisted indices");
            let pair = IndexPair::load(p, embedder.clone())?;
            let stored = pair.metric();
            if stored != metric {
                warn!(configured = ?metric, stored = ?stored, "persisted indices use a different metric than configured; keeping the stored one");
            }
            return Ok(Self::from_parts(pair, settings.retrieval.clone(), embedder, stored, paths, corpus));
        }

        let corpus = match (corpus, &paths) {
            (Some(c), _) => c,
            (None, Some(p)) => return Err(Error::index_not_found(p.first_missing(), "no persisted index and no corpus to build one from")),
            (None, None) => return Err(Error::index_not_found(PathBuf::new(), "no index paths configured and no corpus supplied")),
        };
        let pair = IndexPair::build(&corpus, embedder.clone(), metric)?;
        if let Some(p) = &paths { pair.persist(p)?; }
        Ok(Self::from_parts(pair, settings.retrieval.clone(), embedder, metric, paths, Some(corpus)))
    }

    fn from_parts(pair: IndexPair<I>, config: RetrievalConfig, embedder: Arc<dyn Embedder>, metric: DistanceMetric, paths: Option<IndexPaths>, corpus: Option<Corpus>) -> Self {
        Self { title_index: pair.title, chunk_index: pair.chunk, config, embedder, metric, paths, corpus }
    }

    /// Persist to these paths from now on.
    pub fn with_paths(mut self, paths: IndexPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }
    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
    pub fn metric(&self) -> DistanceMetric { self.metric }
    pub fn paths(&self) -> Option<&IndexPaths> { self.paths.as_ref() }
    pub fn corpus(&self) -> Option<&Corpus> { self.corpus.as_ref() }
    pub fn title_index(&self) -> &I { &self.title_index }
    pub fn chunk_index(&self) -> &I { &self.chunk_index }

    /// Build a fresh pair from `corpus` and swap it in.
    pub fn rebuild(&mut self, corpus: Corpus) -> Result<()> {
        let pair = IndexPair::build(&corpus, self.embedder.clone(), self.metric)?;
        self.install(pair, corpus);
        Ok(())
    }

    pub fn install(&mut self, pair: IndexPair<I>, corpus: Corpus) {
        self.metric = pair.metric();
        self.title_index = pair.title;
        self.chunk_index = pair.chunk;
        self.corpus = Some(corpus);
    }

    pub fn persist(&self) -> Result<()> {
        let paths = self.paths.as_ref().ok_or_else(|| Error::InvalidConfig("index.title_path and index.chunk_path must be set to persist".into()))?;
        self.title_index.persist(&paths.title)?;
        self.chunk_index.persist(&paths.chunk)
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.retrieve_scored(query)?.into_iter().map(|c| c.text).collect())
    }

    pub fn retrieve_scored(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let start = Instant::now();
        let title_vec = self.title_index.embed_query(query)?;
        let chunk_vec = if self.title_index.embedder_id() == self.chunk_index.embedder_id() {
            None
        } else {
            Some(self.chunk_index.embed_query(query)?)
        };
        let chunk_vec = chunk_vec.as_deref().unwrap_or(&title_vec);

        let titles = self.title_index.search_vec(&title_vec, self.config.title_top_n, None)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(titles = ?titles.iter().map(|h| (crop(&h.text), h.distance)).collect::<Vec<_>>(), "retrieved titles");
        }

        let per_title = |hit: &SearchHit| -> Result<Vec<RetrievedChunk>> {
            let filter = MetadataFilter::title(hit.text.as_str());
            let chunks = self.chunk_index.search_vec(chunk_vec, self.config.chunks_per_title, Some(&filter))?;
            Ok(chunks
                .into_iter()
                .map(|c| RetrievedChunk { text: c.text, title: hit.text.clone(), distance: c.distance })
                .collect())
        };
        let groups: Vec<Vec<RetrievedChunk>> = if self.config.parallel {
            titles.par_iter().map(per_title).collect::<Result<_>>()?
        } else {
            titles.iter().map(per_title).collect::<Result<_>>()?
        };

        let mut pool: Vec<RetrievedChunk> = groups.into_iter().flatten().collect();
        // stable: equal distances keep title order, then within-title order
        pool.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(pool = ?summarize(&pool), "candidate chunks");
        }
        pool.truncate(self.config.total_chunks);
        pool.retain(|c| c.distance <= self.config.max_distance);

        debug!(results = ?summarize(&pool), ms = start.elapsed().as_millis() as u64, "final chunks");
        Ok(pool)
    }
}

fn crop(s: &str) -> String { s.chars().take(30).collect() }

fn summarize(pool: &[RetrievedChunk]) -> Vec<(String, f32)> {
    pool.iter().map(|c| (crop(&c.text), c.distance)).collect()
}
