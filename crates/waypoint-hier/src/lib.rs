//! Two-stage retrieval: nearest titles first, then the nearest chunks within
//! each of those titles, merged and re-ranked into one passage list.
pub mod records;
pub mod retriever;
pub mod shared;

pub use records::{chunk_records, title_records};
pub use retriever::{HierarchicalRetriever, IndexPair, IndexPaths, RetrievedChunk};
pub use shared::SharedRetriever;
