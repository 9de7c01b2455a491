//! # lexrag Retrieval (`retrieval`)
//!
//! ## Purpose
//!
//! Query-time half of the engine. A [`Query`] is embedded with the same
//! [`semantic::EmbeddingSelector`] used at ingest, scored against the
//! current [`index::IndexHandle`] snapshot, thresholded, filtered by
//! jurisdiction and domain, and finally turned into a [`RagResponse`].
//!
//! ## Core Types
//!
//! - [`RetrievalConfig`]: `max_retrieved_docs`, `min_relevance_score` and the
//!   confidence mapping range.
//! - [`Retriever`]: embed → search → threshold → filter. An empty result is
//!   `Ok`, never an error.
//! - [`assemble`]: confidence, ordered sources, legal context snippets and
//!   generator output.
//! - [`Generator`]: best-effort answer and follow-up synthesis. Results come
//!   back as [`Generation::Ok`] or [`Generation::Degraded`], so a dead
//!   generator lowers quality without failing the query.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use index::IndexHandle;
//! use ingest::{DocumentStore, LanguagePolicy};
//! use retrieval::{assemble, Query, RetrievalConfig, Retriever, TemplateGenerator};
//! use semantic::{EmbeddingConfig, EmbeddingSelector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let selector = Arc::new(EmbeddingSelector::from_config(&EmbeddingConfig::default())?);
//! let store = Arc::new(DocumentStore::new());
//! let index = Arc::new(IndexHandle::new(selector.dimension()));
//! let config = RetrievalConfig::default();
//! let retriever = Retriever::new(selector, store, index, config.clone(), LanguagePolicy::default());
//!
//! let query = Query::new("notice period for eviction").with_jurisdiction("CA");
//! let found = retriever.retrieve(&query).await?;
//! let response = assemble(&query, found, &TemplateGenerator, &config).await;
//! println!("{} (confidence {:.2})", response.answer, response.confidence);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod engine;
pub mod generate;
pub mod types;

pub use crate::assemble::{assemble, confidence, extractive_answer, NO_RELEVANT_SOURCE_ANSWER};
pub use crate::engine::Retriever;
pub use crate::generate::{
    Generation, GenerationError, GenerationRequest, Generator, HttpGenerator, TemplateGenerator,
    UnavailableGenerator,
};
pub use crate::types::{
    Candidate, GenerationStatus, ProcessingMetadata, Query, QueryFilters, RagResponse, Retrieval,
    RetrievalConfig, RetrievalError, Source,
};
