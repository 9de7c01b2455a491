//! lexrag Ingest
//!
//! This is where legal text enters the engine. Raw documents come in (from a
//! caller or from a corpus directory), get validated, get an embedding, and
//! land in an append-only [`DocumentStore`].
//!
//! ## What we do here
//!
//! - **Validate** - empty content, null bytes and control-character soup are
//!   rejected per document. Jurisdiction, domain and language get defaults.
//! - **Chunk** (optional) - long statutes are split into overlapping windows,
//!   one record per window.
//! - **Embed** - through the [`semantic::EmbeddingSelector`], concurrently
//!   and bounded by `concurrency`. Precomputed vectors are kept as-is.
//! - **Append** - the whole batch goes in under one lock, in input order.
//!
//! One bad document never stops a batch. A missing embedding model does:
//! that is a configuration problem and the batch is refused before anything
//! is written.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ingest::{DocumentStore, IngestConfig, Ingestor, RawDocument};
//! use semantic::{EmbeddingConfig, EmbeddingSelector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let selector = Arc::new(EmbeddingSelector::from_config(&EmbeddingConfig::default())?);
//! let store = Arc::new(DocumentStore::new());
//! let ingestor = Ingestor::new(selector, Arc::clone(&store), IngestConfig::default());
//!
//! let summary = ingestor
//!     .ingest(vec![RawDocument::new("Landlords must give 30 days notice.").with_jurisdiction("CA")])
//!     .await?;
//! assert_eq!(summary.accepted, store.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn, Instrument, Level};
use uuid::Uuid;

use semantic::{EmbedPurpose, EmbeddingSelector};

mod chunker;
mod corpus;
mod error;
mod store;
mod types;
mod validate;

pub use crate::chunker::{Chunk, Chunker, ChunkingConfig};
pub use crate::corpus::{load_corpus_dir, CorpusLoad};
pub use crate::error::IngestError;
pub use crate::store::{DocumentStore, NewDocument};
pub use crate::types::{
    DocumentId, DocumentRecord, Embedding, LanguagePolicy, RawDocument, DEFAULT_DOMAIN,
    DEFAULT_JURISDICTION, DEFAULT_LANGUAGE, PRECOMPUTED_MODEL_NAME,
};

use crate::validate::{validate_document, ValidDocument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Embedding calls in flight per batch.
    pub concurrency: usize,
    pub chunking: ChunkingConfig,
    pub languages: LanguagePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            chunking: ChunkingConfig::default(),
            languages: LanguagePolicy::default(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("ingest.concurrency must be at least 1".into());
        }
        if self.languages.supported.is_empty() {
            return Err("languages.supported must not be empty".into());
        }
        if !self.languages.is_supported(&self.languages.default) {
            return Err(format!(
                "languages.default '{}' is not in languages.supported",
                self.languages.default
            ));
        }
        self.chunking.validate()
    }
}

/// A document of the batch that was not stored.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestFailure {
    /// Index into the submitted batch.
    pub position: usize,
    pub error: IngestError,
}

/// Outcome of one [`Ingestor::ingest`] call.
///
/// `accepted` counts stored records, so with chunking on it can exceed the
/// number of submitted documents.
///
/// Chunks of one document succeed or fail independently. When some chunks
/// fail to embed, the others are still stored and each failed chunk adds
/// one entry to `errors` under the document's `position`, so a position can
/// appear both in `errors` and behind ids in `ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub batch_id: Uuid,
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<IngestFailure>,
    /// Ids of stored records, in append order.
    pub ids: Vec<DocumentId>,
    /// Records stored with a zero-vector fallback embedding.
    pub degraded: usize,
    /// Records produced by splitting a longer document.
    pub chunks: usize,
}

impl IngestSummary {
    fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            accepted: 0,
            rejected: 0,
            errors: Vec::new(),
            ids: Vec::new(),
            degraded: 0,
            chunks: 0,
        }
    }

    fn reject(&mut self, position: usize, error: IngestError) {
        self.rejected += 1;
        self.errors.push(IngestFailure { position, error });
    }
}

// One record to embed; several may share a `position` when chunked.
struct WorkItem {
    position: usize,
    chunked: bool,
    doc: ValidDocument,
}

/// Validates, embeds and stores batches of documents.
pub struct Ingestor {
    selector: Arc<EmbeddingSelector>,
    store: Arc<DocumentStore>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        selector: Arc<EmbeddingSelector>,
        store: Arc<DocumentStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            selector,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingests `batch`, returning per-document results in the summary.
    ///
    /// Returns `Err` only for configuration failures (no usable embedding
    /// model); in that case nothing from the batch is stored.
    pub async fn ingest(&self, batch: Vec<RawDocument>) -> Result<IngestSummary, IngestError> {
        let batch_id = Uuid::new_v4();
        let span = tracing::span!(
            Level::INFO,
            "ingest.batch",
            batch_id = %batch_id,
            documents = batch.len()
        );
        self.ingest_inner(batch_id, batch).instrument(span).await
    }

    async fn ingest_inner(
        &self,
        batch_id: Uuid,
        batch: Vec<RawDocument>,
    ) -> Result<IngestSummary, IngestError> {
        let start = Instant::now();
        let mut summary = IngestSummary::new(batch_id);

        let mut work = Vec::with_capacity(batch.len());
        for (position, raw) in batch.into_iter().enumerate() {
            match validate_document(raw, &self.config.languages) {
                Ok(doc) => self.expand(batch_id, position, doc, &mut work),
                Err(err) => {
                    warn!(position, error = %err, "ingest.rejected");
                    summary.reject(position, err);
                }
            }
        }

        let concurrency = self.config.concurrency.max(1);
        let embedded: Vec<(WorkItem, Result<Embedding, IngestError>)> = stream::iter(work)
            .map(|item| async move {
                let result = self.embed(&item.doc).await;
                (item, result)
            })
            .buffered(concurrency)
            .collect()
            .await;

        if let Some(fatal) = embedded
            .iter()
            .find_map(|(_, r)| r.as_ref().err().filter(|e| e.is_fatal()))
        {
            error!(
                error = %fatal,
                elapsed_micros = start.elapsed().as_micros(),
                "ingest.batch_aborted"
            );
            return Err(fatal.clone());
        }

        let mut pending = Vec::with_capacity(embedded.len());
        let mut meta = Vec::with_capacity(embedded.len());
        for (item, result) in embedded {
            match result {
                Ok(embedding) => {
                    meta.push((item.position, item.chunked, embedding.degraded));
                    pending.push(NewDocument {
                        content: item.doc.content,
                        metadata: item.doc.metadata,
                        jurisdiction: item.doc.jurisdiction,
                        domain: item.doc.domain,
                        language: item.doc.language,
                        embedding: Some(embedding),
                    });
                }
                Err(err) => {
                    warn!(position = item.position, error = %err, "ingest.rejected");
                    summary.reject(item.position, err);
                }
            }
        }

        for ((position, chunked, degraded), result) in
            meta.into_iter().zip(self.store.add_batch(pending))
        {
            match result {
                Ok(id) => {
                    summary.accepted += 1;
                    summary.ids.push(id);
                    summary.degraded += usize::from(degraded);
                    summary.chunks += usize::from(chunked);
                }
                Err(err) => summary.reject(position, err),
            }
        }
        summary.errors.sort_by_key(|f| f.position);

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            degraded = summary.degraded,
            chunks = summary.chunks,
            store_len = self.store.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "ingest.batch_done"
        );
        Ok(summary)
    }

    fn expand(&self, batch_id: Uuid, position: usize, doc: ValidDocument, work: &mut Vec<WorkItem>) {
        let chunking = &self.config.chunking;
        let long = doc.content.chars().count() > chunking.chunk_size;
        if !chunking.enabled || !long || doc.embedding.is_some() {
            work.push(WorkItem {
                position,
                chunked: false,
                doc,
            });
            return;
        }

        let parent = doc
            .metadata
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{batch_id}/{position}"));
        for chunk in Chunker::from_config(chunking).chunk(&doc.content) {
            let mut metadata = doc.metadata.clone();
            metadata.insert("parent_source".into(), Value::String(parent.clone()));
            metadata.insert("chunk_index".into(), Value::from(chunk.index));
            work.push(WorkItem {
                position,
                chunked: true,
                doc: ValidDocument {
                    content: chunk.text,
                    metadata,
                    ..doc.clone()
                },
            });
        }
    }

    async fn embed(&self, doc: &ValidDocument) -> Result<Embedding, IngestError> {
        if let Some(vector) = &doc.embedding {
            let model_name = doc
                .embedding_model
                .clone()
                .or_else(|| {
                    self.selector
                        .select(&doc.content)
                        .map(|rule| rule.model.descriptor().name.clone())
                })
                .unwrap_or_else(|| PRECOMPUTED_MODEL_NAME.to_string());
            return Ok(Embedding {
                vector: vector.clone(),
                model_name,
                degraded: false,
            });
        }
        let selected = self
            .selector
            .select_and_embed(&doc.content, EmbedPurpose::Document)
            .await?;
        Ok(Embedding {
            vector: selected.vector,
            model_name: selected.model_name,
            degraded: selected.degraded,
        })
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}
