//! Approximate nearest-neighbour candidates via HNSW.
//!
//! The graph only proposes candidates. [`VectorIndex`](crate::VectorIndex)
//! re-scores them exactly against the stored rows, so score values and the
//! tie-break order match the exact path; only recall is approximate.
//!
//! Below `min_vectors_for_ann` (or below 10 vectors, where HNSW is flaky)
//! no graph is built and search is a full scan.

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for ANN construction (`index.ann.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnnConfig {
    /// Neighbours per node. Higher = better recall, slower build.
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
    /// Exact scan is the default; turn this on for large corpora.
    pub enabled: bool,
    /// Below this many vectors the exact scan is used even when enabled.
    pub min_vectors_for_ann: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            enabled: false,
            min_vectors_for_ann: 1000,
        }
    }
}

impl AnnConfig {
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_vectors_for_ann(mut self, min: usize) -> Self {
        self.min_vectors_for_ann = min;
        self
    }

    /// Check if ANN should be used given the current dataset size.
    pub fn should_use_ann(&self, num_vectors: usize) -> bool {
        self.enabled && num_vectors >= self.min_vectors_for_ann.max(10)
    }
}

/// Built HNSW graph over the rows of a vector index.
pub(crate) struct AnnGraph {
    hnsw: Hnsw<'static, f32, DistCosine>,
    ef_search: usize,
}

impl AnnGraph {
    /// `rows` must already be normalized; positions become HNSW origin ids.
    pub(crate) fn build(rows: &[Vec<f32>], config: &AnnConfig) -> Self {
        let nb_elem = rows.len();
        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            config.m,
            nb_elem,
            nb_layer,
            config.ef_construction,
            DistCosine {},
        );
        let data_for_insertion: Vec<(&Vec<f32>, usize)> =
            rows.iter().enumerate().map(|(idx, v)| (v, idx)).collect();
        hnsw.parallel_insert(&data_for_insertion);

        Self {
            hnsw,
            ef_search: config.ef_search,
        }
    }

    /// Candidate positions, unordered.
    pub(crate) fn candidates(&self, query: &[f32], k: usize) -> Vec<usize> {
        let ef = self.ef_search.max(k);
        self.hnsw
            .search(query, k, ef)
            .into_iter()
            .map(|neighbour| neighbour.get_origin_id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ann_config_defaults() {
        let config = AnnConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
        assert!(!config.enabled);
        assert_eq!(config.min_vectors_for_ann, 1000);
    }

    #[test]
    fn test_should_use_ann() {
        let config = AnnConfig::default().with_enabled(true);
        assert!(config.should_use_ann(1000));
        assert!(!config.should_use_ann(999));

        let tiny = config.with_min_vectors_for_ann(1);
        assert!(!tiny.should_use_ann(9));
        assert!(tiny.should_use_ann(10));

        assert!(!AnnConfig::default().should_use_ann(10_000));
    }

    #[test]
    fn test_graph_finds_exact_vector() {
        let rows: Vec<Vec<f32>> = (0..64)
            .map(|i| {
                let angle = i as f32 * 0.1;
                vec![angle.cos(), angle.sin(), 0.0]
            })
            .collect();
        let graph = AnnGraph::build(&rows, &AnnConfig::default().with_ef_search(64));
        let hits = graph.candidates(&rows[10], 5);
        assert!(hits.contains(&10));
    }
}
