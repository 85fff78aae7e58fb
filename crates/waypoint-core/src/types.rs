//! Domain types shared by the embedding, vector and retrieval crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Title = String;
pub type Meta = BTreeMap<String, String>;

/// Metadata key under which chunk records carry their owning title.
pub const TITLE_KEY: &str = "title";

/// Input to an index build: a text plus optional metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    #[serde(default)]
    pub meta: Meta,
}

impl Record {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), meta: Meta::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Exact-match metadata predicate. Every clause must match; no clauses matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    clauses: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.insert(key.into(), value.into());
        self
    }

    pub fn title(title: impl Into<String>) -> Self { Self::new().with(TITLE_KEY, title) }

    pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

    pub fn clauses(&self) -> impl Iterator<Item = (&str, &str)> {
        self.clauses.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn matches(&self, meta: &Meta) -> bool {
        self.clauses.iter().all(|(k, v)| meta.get(k) == Some(v))
    }
}

/// Distance used to compare normalised vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance, in `[0, 4]` for unit vectors.
    #[default]
    SquaredL2,
    /// `1 - cosine similarity`, in `[0, 2]`.
    Cosine,
}

impl DistanceMetric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
        match self {
            Self::SquaredL2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 { return 1.0; }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "squared_l2" | "euclidean" => Ok(Self::SquaredL2),
            "cosine" | "cos" => Ok(Self::Cosine),
            other => Err(crate::Error::InvalidConfig(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// One nearest-neighbour result. Lower `distance` is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub distance: f32,
    pub meta: Meta,
}
