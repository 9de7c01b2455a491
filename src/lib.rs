//! # lexrag
//!
//! Legal retrieval-augmented generation engine. This crate ties the
//! workspace together behind one context object, [`RagEngine`]:
//!
//! - [`semantic`]: embedding models and the model selection policy.
//! - [`ingest`]: document records, the append-only store, chunking and the
//!   corpus directory loader.
//! - [`index`]: cosine-similarity vector index with copy-then-swap updates.
//! - [`retrieval`]: query-time ranking, thresholds, filters and response
//!   assembly.
//!
//! ```no_run
//! use lexrag::{EngineConfig, Query, RagEngine, RawDocument};
//!
//! # async fn run() -> Result<(), lexrag::EngineError> {
//! let engine = RagEngine::new(EngineConfig::load(None)?)?;
//! engine
//!     .ingest(vec![RawDocument::new("Tenant eviction notice requirements").with_jurisdiction("CA")])
//!     .await?;
//! engine.rebuild_index().await?;
//!
//! let response = engine
//!     .query(Query::new("What is required to evict a tenant in California?"))
//!     .await?;
//! for source in &response.sources {
//!     println!("{:.3} {} {}", source.score, source.jurisdiction, source.excerpt);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;

pub use crate::config::{
    ConfigError, EngineConfig, GeneratorConfig, GeneratorKind, IndexSection, IngestSection,
};
pub use crate::engine::{CorpusReport, EngineStats, RagEngine};
pub use crate::error::EngineError;
pub use crate::metrics::{EngineMetrics, NoopMetrics};

pub use index::{AnnConfig, IndexStats};
pub use ingest::{DocumentId, DocumentRecord, IngestSummary, LanguagePolicy, RawDocument};
pub use retrieval::{
    GenerationStatus, Generator, Query, QueryFilters, RagResponse, RetrievalConfig, Source,
};
pub use semantic::{EmbeddingConfig, EmbeddingSelector, ModelSpec};

pub use index;
pub use ingest;
pub use retrieval;
pub use semantic;
