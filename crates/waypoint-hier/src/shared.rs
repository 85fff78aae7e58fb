use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::info;

use waypoint_core::traits::PersistentIndex;
use waypoint_core::{Corpus, Result};
use waypoint_vector::FlatIndex;

use crate::retriever::{HierarchicalRetriever, IndexPair, RetrievedChunk};

/// A retriever shared across threads: concurrent readers, exclusive rebuilds.
///
/// `rebuild` embeds the new corpus without holding the lock and only takes
/// the write lock to swap the finished indices in, so queries keep being
/// served from the old indices while a rebuild runs.
pub struct SharedRetriever<I: PersistentIndex = FlatIndex> {
    inner: Arc<RwLock<HierarchicalRetriever<I>>>,
}

impl<I: PersistentIndex> Clone for SharedRetriever<I> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<I: PersistentIndex> SharedRetriever<I> {
    pub fn new(retriever: HierarchicalRetriever<I>) -> Self {
        Self { inner: Arc::new(RwLock::new(retriever)) }
    }

    // A panic while holding the lock cannot leave a half-installed pair behind.
    pub fn read(&self) -> RwLockReadGuard<'_, HierarchicalRetriever<I>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<String>> { self.read().retrieve(query) }

    pub fn retrieve_scored(&self, query: &str) -> Result<Vec<RetrievedChunk>> { self.read().retrieve_scored(query) }

    pub fn rebuild(&self, corpus: Corpus) -> Result<()> {
        let (embedder, metric) = {
            let guard = self.read();
            (guard.embedder().clone(), guard.metric())
        };
        let pair = IndexPair::<I>::build(&corpus, embedder, metric)?;
        self.inner.write().unwrap_or_else(PoisonError::into_inner).install(pair, corpus);
        info!("installed rebuilt indices");
        Ok(())
    }

    pub fn persist(&self) -> Result<()> { self.read().persist() }
}
