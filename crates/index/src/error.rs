use thiserror::Error;

/// Errors produced while building or querying a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndexError {
    /// A vector's width disagrees with the index width.
    #[error("dimension mismatch at position {position}: expected {expected}, got {got}")]
    DimensionMismatch {
        expected: usize,
        got: usize,
        position: usize,
    },
    /// The query vector's width disagrees with the index width.
    #[error("query dimension mismatch: expected {expected}, got {got}")]
    QueryDimensionMismatch { expected: usize, got: usize },
    /// `build` was handed a different number of vectors and ids.
    #[error("length mismatch: {vectors} vectors for {ids} ids")]
    LengthMismatch { vectors: usize, ids: usize },
    /// Zero or non-finite vector that cannot be normalized.
    #[error("vector at position {position} cannot be normalized")]
    DegenerateVector { position: usize },
    /// Query contains NaN or infinite components.
    #[error("query vector contains non-finite values")]
    NonFiniteQuery,
    /// Two partitions of one snapshot claim the same model.
    #[error("model '{model}' appears in more than one partition")]
    DuplicateModel { model: String },
    #[error("ann error: {0}")]
    Ann(String),
}

impl IndexError {
    pub fn ann<E: std::fmt::Display>(err: E) -> Self {
        IndexError::Ann(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_display() {
        let err = IndexError::DimensionMismatch {
            expected: 3,
            got: 2,
            position: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("got 2"));
        assert!(msg.contains("position 4"));
    }

    #[test]
    fn ann_helper_wraps_display() {
        let err = IndexError::ann("graph exploded");
        assert_eq!(err, IndexError::Ann("graph exploded".into()));
    }
}
