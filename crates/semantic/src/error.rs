use thiserror::Error;

/// Errors surfaced while selecting a model or computing an embedding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SemanticError {
    /// No loaded model applies to the text and the degraded fallback is off.
    #[error("no embedding model available for {purpose} text ({chars} chars)")]
    NoEmbeddingModelAvailable { purpose: String, chars: usize },
    /// A model produced (or declares) vectors of the wrong width.
    #[error("model '{model}' dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        got: usize,
    },
    /// No loaded model in the table has this name.
    #[error("embedding model '{model}' is not available")]
    ModelUnavailable { model: String },
    /// Configuration is inconsistent (missing URL, zero dimension, ...).
    #[error("invalid semantic config: {0}")]
    InvalidConfig(String),
    /// The HTTP call to a remote model failed before a response arrived.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The model ran but its output could not be used.
    #[error("inference failure: {0}")]
    Inference(String),
}

impl SemanticError {
    /// True for errors that come from configuration rather than from a single text.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SemanticError::NoEmbeddingModelAvailable { .. }
                | SemanticError::DimensionMismatch { .. }
                | SemanticError::ModelUnavailable { .. }
                | SemanticError::InvalidConfig(_)
        )
    }
}
