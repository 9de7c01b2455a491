use std::sync::Arc;
use std::time::Duration;

use index::IndexError;
use ingest::{ChunkingConfig, DocumentId, DocumentRecord};
use semantic::{SelectedEmbedding, SemanticError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Query-time knobs. Chunking lives here because it is configured next to
/// the retrieval window it feeds, even though the ingestor applies it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// `k` passed to the vector index.
    pub max_retrieved_docs: usize,
    /// Candidates scoring below this are dropped before filtering.
    pub min_relevance_score: f32,
    /// Top score mapped to confidence 0.
    pub confidence_floor: f32,
    /// Top score mapped to confidence 1.
    pub confidence_ceiling: f32,
    /// Characters of each source copied into the response.
    pub excerpt_chars: usize,
    pub chunking: ChunkingConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_retrieved_docs: 5,
            min_relevance_score: 0.3,
            confidence_floor: 0.0,
            confidence_ceiling: 1.0,
            excerpt_chars: 300,
            chunking: ChunkingConfig::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.max_retrieved_docs == 0 {
            return Err(RetrievalError::InvalidConfig(
                "max_retrieved_docs must be greater than zero".into(),
            ));
        }
        if !self.min_relevance_score.is_finite()
            || !(-1.0..=1.0).contains(&self.min_relevance_score)
        {
            return Err(RetrievalError::InvalidConfig(
                "min_relevance_score must be between -1.0 and 1.0".into(),
            ));
        }
        if !self.confidence_floor.is_finite()
            || !self.confidence_ceiling.is_finite()
            || self.confidence_floor >= self.confidence_ceiling
        {
            return Err(RetrievalError::InvalidConfig(format!(
                "confidence_floor ({}) must be below confidence_ceiling ({})",
                self.confidence_floor, self.confidence_ceiling
            )));
        }
        if self.excerpt_chars == 0 {
            return Err(RetrievalError::InvalidConfig(
                "excerpt_chars must be greater than zero".into(),
            ));
        }
        self.chunking
            .validate()
            .map_err(RetrievalError::InvalidConfig)
    }
}

/// Post-ranking filters. Matching is case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryFilters {
    pub jurisdiction: Option<String>,
    pub domain: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.jurisdiction.is_none() && self.domain.is_none()
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        fn eq(want: &Option<String>, have: &str) -> bool {
            want.as_deref()
                .map_or(true, |w| w.trim().eq_ignore_ascii_case(have.trim()))
        }
        eq(&self.jurisdiction, &record.jurisdiction) && eq(&self.domain, &record.domain)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub filters: QueryFilters,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.filters.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.filters.domain = Some(domain.into());
        self
    }
}

/// A ranked document that cleared the relevance threshold and the filters.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: DocumentId,
    pub score: f32,
    /// Zero-based rank among returned candidates.
    pub rank: usize,
    pub record: Arc<DocumentRecord>,
}

/// Output of [`Retriever::retrieve`](crate::Retriever::retrieve).
///
/// An empty `candidates` list means "no relevant source" and is not an error.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub candidates: Vec<Candidate>,
    pub query_embedding: SelectedEmbedding,
    /// Resolved query language.
    pub language: String,
    pub index_generation: u64,
    pub indexed_vectors: usize,
    /// Index partitions the query was scored against, one per embedding model.
    pub models_searched: Vec<String>,
    /// Hits returned by the index before thresholding.
    pub searched: usize,
    pub above_threshold: usize,
    pub elapsed: Duration,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.candidates.first().map(|c| c.score)
    }
}

/// One cited document in a [`RagResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub id: DocumentId,
    pub rank: usize,
    pub score: f32,
    pub jurisdiction: String,
    pub domain: String,
    pub language: String,
    pub excerpt: String,
    pub metadata: Map<String, Value>,
}

/// Outcome of a best-effort generator call, as recorded in metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationStatus {
    Ok,
    Degraded { reason: String },
    /// The generator was not called (no candidates).
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingMetadata {
    pub query_language: String,
    pub embedding_model: String,
    pub query_degraded: bool,
    pub index_generation: u64,
    pub indexed_vectors: usize,
    pub models_searched: Vec<String>,
    pub candidates_searched: usize,
    pub candidates_above_threshold: usize,
    pub candidates_returned: usize,
    pub filters_applied: bool,
    pub generator: String,
    pub answer_status: GenerationStatus,
    pub follow_up_status: GenerationStatus,
    pub retrieval_micros: u64,
    pub assembly_micros: u64,
}

/// Final answer for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResponse {
    pub answer: String,
    /// In `[0, 1]`. Zero whenever `sources` is empty.
    pub confidence: f32,
    pub sources: Vec<Source>,
    pub legal_context: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub processing_metadata: ProcessingMetadata,
}

/// Errors produced by the retrieval layer.
///
/// Generation problems are not here: they degrade the response instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetrievalError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid retrieval config: {0}")]
    InvalidConfig(String),
    #[error("query embedding failed: {0}")]
    Semantic(#[from] SemanticError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

impl RetrievalError {
    /// True for failures caused by setup rather than the query itself.
    pub fn is_configuration(&self) -> bool {
        match self {
            RetrievalError::InvalidConfig(_) => true,
            RetrievalError::Semantic(e) => e.is_configuration(),
            RetrievalError::Index(IndexError::QueryDimensionMismatch { .. }) => true,
            _ => false,
        }
    }
}
