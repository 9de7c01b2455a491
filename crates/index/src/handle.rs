use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::{IndexConfig, IndexError, IndexSnapshot, Partition};

/// Shared pointer to the current [`IndexSnapshot`].
///
/// Readers call [`snapshot`](Self::snapshot) and keep the returned `Arc` for
/// the whole search. Writers build a complete new snapshot off to the side
/// and [`install`](Self::install) it; the old one lives until its last
/// reader drops it.
pub struct IndexHandle<I> {
    current: ArcSwap<IndexSnapshot<I>>,
    generation: AtomicU64,
}

impl<I: Clone> IndexHandle<I> {
    pub fn new(dimension: usize) -> Self {
        Self {
            current: ArcSwap::from_pointee(IndexSnapshot::empty(dimension)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot<I>> {
        self.current.load_full()
    }

    /// Publishes `snapshot` and returns the previous one.
    pub fn install(&self, mut snapshot: IndexSnapshot<I>) -> Arc<IndexSnapshot<I>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.set_generation(generation);
        let len = snapshot.len();
        let models = snapshot.partitions().count();
        let previous = self.current.swap(Arc::new(snapshot));
        info!(generation, vectors = len, models, "index.swap");
        previous
    }

    /// Builds a fresh snapshot and installs it. On error the current one is untouched.
    pub fn rebuild(
        &self,
        partitions: Vec<Partition<I>>,
        config: &IndexConfig,
    ) -> Result<Arc<IndexSnapshot<I>>, IndexError> {
        let snapshot = IndexSnapshot::build(partitions, config)?;
        self.install(snapshot);
        Ok(self.snapshot())
    }
}

impl<I> std::fmt::Debug for IndexHandle<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}
