use index::IndexError;
use ingest::IngestError;
use retrieval::RetrievalError;
use semantic::SemanticError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by [`RagEngine`](crate::RagEngine).
///
/// Empty results and degraded generation are not errors; they show up in the
/// response metadata instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("embedding: {0}")]
    Semantic(#[from] SemanticError),

    #[error("ingest: {0}")]
    Ingest(#[from] IngestError),

    #[error("index: {0}")]
    Index(#[from] IndexError),

    #[error("retrieval: {0}")]
    Retrieval(#[from] RetrievalError),

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// True for failures that no retry will fix without a config change.
    pub fn is_configuration(&self) -> bool {
        match self {
            EngineError::Config(_) => true,
            EngineError::Semantic(e) => e.is_configuration(),
            EngineError::Ingest(e) => e.is_fatal(),
            EngineError::Retrieval(e) => e.is_configuration(),
            EngineError::Index(_) | EngineError::Task(_) => false,
        }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_configuration() {
        let err: EngineError = ConfigError::Validation("bad".into()).into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "invalid configuration: bad");
    }

    #[test]
    fn invalid_query_is_not_configuration() {
        let err: EngineError = RetrievalError::InvalidQuery("empty".into()).into();
        assert!(!err.is_configuration());
        assert!(err.to_string().starts_with("retrieval:"));
    }
}
