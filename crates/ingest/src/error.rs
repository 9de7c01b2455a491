//! Error types for the ingest layer.
//!
//! Two kinds of failure live here. Per-document problems (empty content, an
//! embedding call that failed for that one text, an unreadable corpus file)
//! are recovered inside a batch and reported in the
//! [`IngestSummary`](crate::IngestSummary). Configuration problems (no
//! embedding model at all) abort the batch and come back as `Err`.

use semantic::SemanticError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum IngestError {
    /// The record cannot be stored (e.g. empty content).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Embedding the record failed.
    ///
    /// Configuration flavours of [`SemanticError`] abort the whole batch;
    /// everything else only rejects the record.
    #[error("embedding failed: {0}")]
    Embedding(#[from] SemanticError),

    /// A corpus file, or one record in it, could not be read or parsed.
    #[error("corpus file {path}: {reason}")]
    Corpus { path: String, reason: String },

    /// Filesystem access failed outside a specific corpus file.
    #[error("io error: {0}")]
    Io(String),
}

impl IngestError {
    /// True if this error should stop the entire batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Embedding(e) if e.is_configuration())
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}
