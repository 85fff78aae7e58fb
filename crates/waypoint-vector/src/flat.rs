use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use waypoint_core::traits::{Embedder, PersistentIndex, VectorIndex};
use waypoint_core::types::{DistanceMetric, MetadataFilter, Record, SearchHit};
use waypoint_core::{Error, Result};

use crate::snapshot::{self, StoredRecord};
use crate::topk::{Candidate, TopK};

const EMBED_BATCH: usize = 64;

/// metadata key -> value -> ascending record positions
type Postings = BTreeMap<String, BTreeMap<String, Vec<usize>>>;

/// Brute-force index: every search scores each candidate record exactly.
pub struct FlatIndex {
    records: Vec<StoredRecord>,
    postings: Postings,
    dim: usize,
    metric: DistanceMetric,
    embedder_id: String,
    build_id: Option<String>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("records", &self.records.len())
            .field("dim", &self.dim)
            .field("metric", &self.metric)
            .field("embedder_id", &self.embedder_id)
            .field("build_id", &self.build_id)
            .finish()
    }
}

fn build_postings(records: &[StoredRecord]) -> Postings {
    let mut postings = Postings::new();
    for (pos, rec) in records.iter().enumerate() {
        for (k, v) in &rec.meta {
            postings.entry(k.clone()).or_default().entry(v.clone()).or_default().push(pos);
        }
    }
    postings
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({percent}%)")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

impl FlatIndex {
    /// Stored texts in insertion order.
    pub fn texts(&self) -> impl Iterator<Item = &str> { self.records.iter().map(|r| r.text.as_str()) }

    /// Distinct values recorded under a metadata key.
    pub fn meta_values(&self, key: &str) -> impl Iterator<Item = &str> {
        self.postings.get(key).into_iter().flat_map(|m| m.keys().map(String::as_str))
    }

    /// Positions of records satisfying `filter`, ascending. `None` means all records.
    fn candidates(&self, filter: Option<&MetadataFilter>) -> Option<Vec<usize>> {
        let filter = filter.filter(|f| !f.is_empty())?;
        let mut shortest: Option<&Vec<usize>> = None;
        for (k, v) in filter.clauses() {
            match self.postings.get(k).and_then(|m| m.get(v)) {
                None => return Some(Vec::new()),
                Some(list) if shortest.map_or(true, |s| list.len() < s.len()) => shortest = Some(list),
                Some(_) => {}
            }
        }
        let list = shortest.map(Vec::as_slice).unwrap_or(&[]);
        Some(list.iter().copied().filter(|&pos| filter.matches(&self.records[pos].meta)).collect())
    }

    fn score(&self, query_vec: &[f32], pos: usize) -> Candidate {
        Candidate { distance: self.metric.distance(query_vec, &self.records[pos].vector), pos }
    }
}

impl VectorIndex for FlatIndex {
    fn len(&self) -> usize { self.records.len() }
    fn dim(&self) -> usize { self.dim }
    fn metric(&self) -> DistanceMetric { self.metric }
    fn embedder_id(&self) -> &str { &self.embedder_id }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let v = self.embedder.embed_one(query)?;
        if v.len() != self.dim {
            return Err(Error::Embedding(format!("query vector has dimension {}, index expects {}", v.len(), self.dim)));
        }
        Ok(v)
    }

    fn search_vec(&self, query_vec: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>> {
        if k == 0 { return Err(Error::InvalidInput("k must be at least 1".into())); }
        if query_vec.len() != self.dim {
            return Err(Error::InvalidInput(format!("query vector has dimension {}, index expects {}", query_vec.len(), self.dim)));
        }
        let mut top = TopK::new(k);
        match self.candidates(filter) {
            Some(positions) => positions.into_iter().for_each(|pos| top.push(self.score(query_vec, pos))),
            None => (0..self.records.len()).for_each(|pos| top.push(self.score(query_vec, pos))),
        }
        Ok(top
            .into_sorted()
            .into_iter()
            .map(|c| {
                let rec = &self.records[c.pos];
                SearchHit { text: rec.text.clone(), distance: c.distance, meta: rec.meta.clone() }
            })
            .collect())
    }
}

impl PersistentIndex for FlatIndex {
    fn build(records: &[Record], embedder: Arc<dyn Embedder>, metric: DistanceMetric) -> Result<Self> {
        if records.is_empty() { return Err(Error::EmptyInput("cannot build an index from zero records".into())); }
        let dim = embedder.dim();
        info!(records = records.len(), dim, embedder = embedder.embedder_id(), "building flat index");
        let pb = progress_bar(records.len());
        let mut stored = Vec::with_capacity(records.len());
        for batch in records.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts)?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
            }
            for (rec, vector) in batch.iter().zip(vectors) {
                if vector.len() != dim {
                    return Err(Error::Embedding(format!("embedder returned a {}-d vector, expected {}", vector.len(), dim)));
                }
                stored.push(StoredRecord { text: rec.text.clone(), vector, meta: rec.meta.clone() });
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        let postings = build_postings(&stored);
        Ok(Self { records: stored, postings, dim, metric, embedder_id: embedder.embedder_id().to_string(), build_id: None, embedder })
    }

    fn persist(&self, path: &Path) -> Result<()> {
        let manifest = snapshot::write(path, &self.embedder_id, self.dim, self.metric, self.build_id.as_deref(), &self.records)?;
        info!(path = %path.display(), records = manifest.record_count, checksum = %manifest.checksum, "persisted index");
        Ok(())
    }

    fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let (manifest, records) = snapshot::read(path)?;
        if manifest.dim != embedder.dim() {
            return Err(Error::IncompatibleIndex {
                path: path.to_path_buf(),
                reason: format!("index stores {}-d vectors ({}), embedder produces {}-d ({})", manifest.dim, manifest.embedder_id, embedder.dim(), embedder.embedder_id()),
            });
        }
        if manifest.embedder_id != embedder.embedder_id() {
            warn!(path = %path.display(), stored = %manifest.embedder_id, current = embedder.embedder_id(), "index was built with a different embedder");
        }
        debug!(path = %path.display(), created_at = %manifest.created_at, build_id = ?manifest.build_id, "loaded snapshot");
        info!(path = %path.display(), records = records.len(), metric = ?manifest.metric, "loaded index");
        let postings = build_postings(&records);
        Ok(Self {
            records,
            postings,
            dim: manifest.dim,
            metric: manifest.metric,
            embedder_id: manifest.embedder_id,
            build_id: manifest.build_id,
            embedder,
        })
    }

    fn build_id(&self) -> Option<&str> { self.build_id.as_deref() }

    fn with_build_id(mut self, id: String) -> Self {
        self.build_id = Some(id);
        self
    }
}
