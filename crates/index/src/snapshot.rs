//! One published corpus state: a [`VectorIndex`] per embedding model.
//!
//! Vectors from different models live in different spaces even when their
//! widths agree, so they are never scored against each other. Each partition
//! is keyed by the name of the model that produced its vectors.

use serde::{Deserialize, Serialize};

use crate::{IndexConfig, IndexError, IndexStats, VectorIndex};

/// Input for one partition of a snapshot build.
#[derive(Debug, Clone)]
pub struct Partition<I> {
    pub model: String,
    pub vectors: Vec<Vec<f32>>,
    pub ids: Vec<I>,
}

impl<I> Partition<I> {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            vectors: Vec::new(),
            ids: Vec::new(),
        }
    }

    pub fn push(&mut self, vector: Vec<f32>, id: I) {
        self.vectors.push(vector);
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Per-model size facts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionStats {
    pub model: String,
    pub len: usize,
}

/// Immutable set of per-model indexes, sorted by model name.
#[derive(Debug)]
pub struct IndexSnapshot<I> {
    partitions: Vec<(String, VectorIndex<I>)>,
    dimension: usize,
    generation: u64,
}

impl<I: Clone> IndexSnapshot<I> {
    pub fn empty(dimension: usize) -> Self {
        Self {
            partitions: Vec::new(),
            dimension,
            generation: 0,
        }
    }

    /// Builds every partition. Empty partitions are dropped; a repeated
    /// model name is an error.
    pub fn build(partitions: Vec<Partition<I>>, config: &IndexConfig) -> Result<Self, IndexError> {
        let mut seen: Vec<String> = Vec::with_capacity(partitions.len());
        let mut built: Vec<(String, VectorIndex<I>)> = Vec::with_capacity(partitions.len());
        for partition in partitions {
            if seen.contains(&partition.model) {
                return Err(IndexError::DuplicateModel {
                    model: partition.model,
                });
            }
            seen.push(partition.model.clone());
            if partition.is_empty() {
                continue;
            }
            let index = VectorIndex::build(partition.vectors, partition.ids, config)?;
            built.push((partition.model, index));
        }
        built.sort_by(|a, b| a.0.cmp(&b.0));

        let dimension = config
            .dimension
            .or_else(|| built.first().map(|(_, index)| index.dimension()))
            .unwrap_or(0);
        if let Some((_, index)) = built.iter().find(|(_, index)| index.dimension() != dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                got: index.dimension(),
                position: 0,
            });
        }

        Ok(Self {
            partitions: built,
            dimension,
            generation: 0,
        })
    }
}

impl<I> IndexSnapshot<I> {
    /// The index built from `model`'s vectors, if any were indexed.
    pub fn get(&self, model: &str) -> Option<&VectorIndex<I>> {
        self.partitions
            .binary_search_by(|(name, _)| name.as_str().cmp(model))
            .ok()
            .map(|pos| &self.partitions[pos].1)
    }

    pub fn partitions(&self) -> impl Iterator<Item = (&str, &VectorIndex<I>)> {
        self.partitions
            .iter()
            .map(|(model, index)| (model.as_str(), index))
    }

    pub fn models(&self) -> Vec<&str> {
        self.partitions.iter().map(|(m, _)| m.as_str()).collect()
    }

    /// Vectors across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|(_, index)| index.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
        for (_, index) in &mut self.partitions {
            index.set_generation(generation);
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            len: self.len(),
            dimension: self.dimension,
            generation: self.generation,
            ann: self.partitions.iter().any(|(_, index)| index.stats().ann),
            models: self.partitions.len(),
        }
    }

    pub fn partition_stats(&self) -> Vec<PartitionStats> {
        self.partitions
            .iter()
            .map(|(model, index)| PartitionStats {
                model: model.clone(),
                len: index.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(model: &str, rows: Vec<(Vec<f32>, u32)>) -> Partition<u32> {
        let mut p = Partition::new(model);
        for (v, id) in rows {
            p.push(v, id);
        }
        p
    }

    #[test]
    fn partitions_are_sorted_and_looked_up_by_model() {
        let snap = IndexSnapshot::build(
            vec![
                partition("general", vec![(vec![1.0, 0.0], 1), (vec![0.0, 1.0], 2)]),
                partition("domain", vec![(vec![1.0, 1.0], 3)]),
            ],
            &IndexConfig::default(),
        )
        .unwrap();
        assert_eq!(snap.models(), vec!["domain", "general"]);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get("general").unwrap().ids(), &[1, 2]);
        assert_eq!(snap.get("domain").unwrap().ids(), &[3]);
        assert!(snap.get("other").is_none());
        assert_eq!(snap.stats().models, 2);
        assert_eq!(
            snap.partition_stats(),
            vec![
                PartitionStats { model: "domain".into(), len: 1 },
                PartitionStats { model: "general".into(), len: 2 },
            ]
        );
    }

    #[test]
    fn models_are_searched_separately() {
        let snap = IndexSnapshot::build(
            vec![
                partition("a", vec![(vec![1.0, 0.0], 1)]),
                partition("b", vec![(vec![0.0, 1.0], 2)]),
            ],
            &IndexConfig::default(),
        )
        .unwrap();
        let hits = snap.get("a").unwrap().search(&[0.0, 1.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        assert!(hits[0].score.abs() < 1e-6);
    }

    #[test]
    fn empty_partitions_are_dropped() {
        let snap = IndexSnapshot::build(
            vec![Partition::<u32>::new("idle"), partition("busy", vec![(vec![1.0], 4)])],
            &IndexConfig::default(),
        )
        .unwrap();
        assert_eq!(snap.models(), vec!["busy"]);
    }

    #[test]
    fn repeated_model_is_rejected() {
        let err = IndexSnapshot::build(
            vec![
                partition("dup", vec![(vec![1.0], 1)]),
                partition("dup", vec![(vec![1.0], 2)]),
            ],
            &IndexConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, IndexError::DuplicateModel { model: "dup".into() });
    }

    #[test]
    fn partition_widths_must_agree() {
        let err = IndexSnapshot::build(
            vec![
                partition("a", vec![(vec![1.0, 0.0], 1)]),
                partition("b", vec![(vec![1.0, 0.0, 0.0], 2)]),
            ],
            &IndexConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, got: 3, .. }));
    }
}
