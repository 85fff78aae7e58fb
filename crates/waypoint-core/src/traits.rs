use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{DistanceMetric, MetadataFilter, Record, SearchHit};

/// Maps text to fixed-length, L2-normalised vectors.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `bert:<model>:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::Error::Embedding("embedder returned no vector".into()))
    }
}

/// Nearest-neighbour search over stored (text, vector, metadata) records.
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn dim(&self) -> usize;
    fn metric(&self) -> DistanceMetric;
    /// Identifier of the embedder whose vectors this index stores.
    fn embedder_id(&self) -> &str;
    fn embed_query(&self, query: &str) -> Result<Vec<f32>>;
    /// Up to `k` records closest to `query_vec` that satisfy `filter`, ascending by distance.
    fn search_vec(&self, query_vec: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>>;

    fn search(&self, query: &str, k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>> {
        let q_vec = self.embed_query(query)?;
        self.search_vec(&q_vec, k, filter)
    }
}

/// A vector index that can be built from records and round-tripped through a file.
pub trait PersistentIndex: VectorIndex + Sized {
    fn build(records: &[Record], embedder: Arc<dyn Embedder>, metric: DistanceMetric) -> Result<Self>;
    fn persist(&self, path: &Path) -> Result<()>;
    fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self>;

    /// Tag shared by indices built together, persisted alongside the records.
    fn build_id(&self) -> Option<&str>;
    fn with_build_id(self, id: String) -> Self;
}
