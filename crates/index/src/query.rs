use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredId<I> {
    pub id: I,
    /// Inner product of the normalized query and row, i.e. cosine similarity.
    pub score: f32,
    /// Insertion position inside the snapshot that produced the hit.
    pub position: usize,
}

/// Higher score first, then earlier insertion.
pub(crate) fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Keeps the `k` best `(position, score)` pairs in rank order.
pub(crate) fn top_k(mut scored: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    if k == 0 || scored.is_empty() {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, rank_order);
        scored.truncate(k);
    }
    scored.sort_by(rank_order);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_sorts_descending() {
        let out = top_k(vec![(0, 0.1), (1, 0.9), (2, 0.5)], 3);
        assert_eq!(out, vec![(1, 0.9), (2, 0.5), (0, 0.1)]);
    }

    #[test]
    fn top_k_breaks_ties_by_position() {
        let out = top_k(vec![(3, 0.5), (1, 0.5), (2, 0.5), (0, 0.2)], 2);
        assert_eq!(out, vec![(1, 0.5), (2, 0.5)]);
    }

    #[test]
    fn top_k_zero_is_empty() {
        assert!(top_k(vec![(0, 1.0)], 0).is_empty());
    }

    #[test]
    fn top_k_larger_than_input_returns_all() {
        assert_eq!(top_k(vec![(0, 0.3), (1, 0.4)], 10).len(), 2);
    }
}
