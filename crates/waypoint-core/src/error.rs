use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An index build was attempted with zero records.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A persisted index is missing or cannot be decoded.
    #[error("Index not found at {path}: {reason}")]
    IndexNotFound { path: PathBuf, reason: String },

    /// The embedding provider could not produce a vector.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A persisted index does not fit the embedder it is loaded with.
    #[error("Incompatible index at {path}: {reason}")]
    IncompatibleIndex { path: PathBuf, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn index_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexNotFound { path: path.into(), reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Self::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
