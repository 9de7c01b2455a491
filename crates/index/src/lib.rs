//! # lexrag Index
//!
//! Cosine-similarity index over document embeddings.
//!
//! A [`VectorIndex`] is built in one batch from `(vector, id)` pairs and is
//! read-only afterwards. Every row is L2-normalized exactly once at build
//! time, so search is a plain inner product. Results come back sorted by
//! score, highest first, with ties going to the earlier-inserted id.
//!
//! An [`IndexSnapshot`] groups one `VectorIndex` per embedding model, so a
//! query is only ever scored against vectors from the model that embedded it.
//!
//! Corpus changes never mutate a built index. Build a new snapshot and
//! install it through an [`IndexHandle`], which swaps the pointer atomically;
//! searches already running keep the snapshot they started with.
//!
//! ## Example
//!
//! ```
//! use index::{IndexConfig, VectorIndex};
//!
//! let index = VectorIndex::build(
//!     vec![vec![1.0, 0.0], vec![0.6, 0.8]],
//!     vec!["a", "b"],
//!     &IndexConfig::default(),
//! )
//! .unwrap();
//! let hits = index.search(&[1.0, 0.0], 1).unwrap();
//! assert_eq!(hits[0].id, "a");
//! ```

pub mod ann;
pub mod error;
pub mod handle;
pub mod query;
pub mod snapshot;

pub use crate::ann::AnnConfig;
pub use crate::error::IndexError;
pub use crate::handle::IndexHandle;
pub use crate::query::ScoredId;
pub use crate::snapshot::{IndexSnapshot, Partition, PartitionStats};

use ann::AnnGraph;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Build-time settings (`index.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct IndexConfig {
    /// Required width. When `None` the first vector decides.
    pub dimension: Option<usize>,
    pub ann: AnnConfig,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn with_ann(mut self, ann: AnnConfig) -> Self {
        self.ann = ann;
        self
    }
}

/// Size facts about one snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub len: usize,
    pub dimension: usize,
    /// Incremented by [`IndexHandle`] on every install; 0 for a bare build.
    pub generation: u64,
    pub ann: bool,
    /// Embedding models with at least one indexed vector.
    pub models: usize,
}

/// Immutable snapshot of normalized vectors and their ids, in insertion order.
pub struct VectorIndex<I> {
    matrix: Array2<f32>,
    ids: Vec<I>,
    dimension: usize,
    generation: u64,
    ann: Option<AnnGraph>,
}

impl<I> std::fmt::Debug for VectorIndex<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("len", &self.ids.len())
            .field("dimension", &self.dimension)
            .field("generation", &self.generation)
            .field("ann", &self.ann.is_some())
            .finish()
    }
}

impl<I: Clone> VectorIndex<I> {
    /// Index with no rows. Searches return nothing.
    pub fn empty(dimension: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dimension)),
            ids: Vec::new(),
            dimension,
            generation: 0,
            ann: None,
        }
    }

    /// Validates, normalizes and stores `vectors`, paired positionally with `ids`.
    pub fn build(
        vectors: Vec<Vec<f32>>,
        ids: Vec<I>,
        config: &IndexConfig,
    ) -> Result<Self, IndexError> {
        let start = Instant::now();
        if vectors.len() != ids.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                ids: ids.len(),
            });
        }

        let dimension = config
            .dimension
            .or_else(|| vectors.first().map(Vec::len))
            .unwrap_or(0);
        if vectors.is_empty() {
            return Ok(Self::empty(dimension));
        }

        let mut rows = vectors;
        for (position, row) in rows.iter_mut().enumerate() {
            if row.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    got: row.len(),
                    position,
                });
            }
            if !normalize_row(row) {
                return Err(IndexError::DegenerateVector { position });
            }
        }

        let ann = config
            .ann
            .should_use_ann(rows.len())
            .then(|| AnnGraph::build(&rows, &config.ann));

        let n = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((n, dimension), flat).map_err(IndexError::ann)?;

        info!(
            vectors = n,
            dimension,
            ann = ann.is_some(),
            elapsed_micros = start.elapsed().as_micros() as u64,
            "index.build"
        );

        Ok(Self {
            matrix,
            ids,
            dimension,
            generation: 0,
            ann,
        })
    }

    /// Up to `k` hits, best first. `k` larger than the index is clamped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId<I>>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::QueryDimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if !query.iter().all(|x| x.is_finite()) {
            return Err(IndexError::NonFiniteQuery);
        }

        let mut q = Array1::from(query.to_vec());
        let norm = q.dot(&q).sqrt();
        if norm > 0.0 {
            q /= norm;
        }

        let k = k.min(self.len());
        let scored: Vec<(usize, f32)> = match &self.ann {
            Some(graph) => graph
                .candidates(q.as_slice().unwrap_or(query), k)
                .into_iter()
                .filter(|&pos| pos < self.len())
                .map(|pos| (pos, self.matrix.row(pos).dot(&q)))
                .collect(),
            None => self
                .matrix
                .dot(&q)
                .iter()
                .copied()
                .enumerate()
                .collect(),
        };

        Ok(query::top_k(scored, k)
            .into_iter()
            .map(|(position, score)| ScoredId {
                id: self.ids[position].clone(),
                score,
                position,
            })
            .collect())
    }
}

impl<I> VectorIndex<I> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[I] {
        &self.ids
    }

    /// Stored (normalized) row at `position`.
    pub fn vector(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.len()).then(|| self.matrix.row(position))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            len: self.len(),
            dimension: self.dimension,
            generation: self.generation,
            ann: self.ann.is_some(),
            models: usize::from(!self.is_empty()),
        }
    }
}

/// Normalizes in place; false for zero or non-finite rows.
fn normalize_row(row: &mut [f32]) -> bool {
    if !row.iter().all(|x| x.is_finite()) {
        return false;
    }
    let norm_sq: f32 = row.iter().map(|x| x * x).sum();
    if norm_sq <= 0.0 || !norm_sq.is_finite() {
        return false;
    }
    let inv = norm_sq.sqrt().recip();
    row.iter_mut().for_each(|x| *x *= inv);
    true
}
