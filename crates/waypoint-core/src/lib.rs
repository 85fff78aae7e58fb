//! Shared data model, errors, configuration and traits for the waypoint
//! retrieval workspace.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::Corpus;
pub use error::{Error, Result};
