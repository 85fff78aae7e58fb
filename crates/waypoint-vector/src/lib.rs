//! Exact nearest-neighbour index over embedded records, persisted as a
//! single checksummed snapshot file.
//!
//! Typical flow:
//! 1) `FlatIndex::build` embeds the records in batches and keeps them in insertion order
//! 2) `search`/`search_vec` scan the (optionally metadata-filtered) records for the k closest
//! 3) `persist` writes a snapshot atomically; `load` verifies and restores it
pub mod flat;
pub mod snapshot;
mod topk;

pub use flat::FlatIndex;
pub use snapshot::{read_manifest, Manifest, StoredRecord};
