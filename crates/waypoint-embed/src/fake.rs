use std::hash::Hasher;

use twox_hash::XxHash64;

use waypoint_core::traits::Embedder;
use waypoint_core::Result;

/// Deterministic model-free embedder for tests and offline runs.
///
/// Each lowercase alphanumeric word is projected onto `dim` pseudo-random
/// coordinates in `[-1, 1)` (coordinate `i` hashes the word with seed `i`);
/// the word vectors are summed and L2-normalised. Texts sharing words land
/// close together, unrelated texts are near-orthogonal. Text without any
/// word embeds to the first unit axis.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            for (i, slot) in v.iter_mut().enumerate() {
                let mut hasher = XxHash64::with_seed(i as u64);
                hasher.write(token.as_bytes());
                let h = hasher.finish();
                *slot += ((h >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            // no words: pin to the first axis so the output stays unit length
            v[0] = 1.0;
            return v;
        }
        for x in &mut v { *x /= norm; }
        v
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
