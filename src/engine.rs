use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use index::{IndexConfig, IndexHandle, IndexStats, Partition};
use ingest::{
    load_corpus_dir, DocumentId, DocumentStore, IngestFailure, IngestSummary, Ingestor,
    RawDocument,
};
use retrieval::{
    assemble, GenerationStatus, Generator, HttpGenerator, Query, RagResponse, Retriever,
    TemplateGenerator, UnavailableGenerator,
};
use semantic::EmbeddingSelector;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn, Instrument, Level};

use crate::config::{ConfigError, EngineConfig, GeneratorConfig, GeneratorKind};
use crate::error::EngineError;
use crate::metrics::{EngineMetrics, MetricsSpan, NoopMetrics};

/// Counters reported by [`RagEngine::stats`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EngineStats {
    pub total_queries: u64,
    pub avg_response_time_ms: f64,
    pub documents: usize,
    pub indexed_vectors: usize,
    pub index_generation: u64,
}

/// Outcome of [`RagEngine::load_corpus`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusReport {
    pub files_read: usize,
    /// Files or records that could not be read or parsed; the rest of the corpus still loads.
    pub file_errors: Vec<String>,
    pub ingest: IngestSummary,
    pub index: IndexStats,
}

/// Context object owning every component of the engine.
///
/// Construct once and share behind an `Arc`; all methods take `&self`.
/// Ingestion appends to the store but does not touch the index. Call
/// [`rebuild_index`](Self::rebuild_index) to make new records searchable.
pub struct RagEngine {
    config: EngineConfig,
    selector: Arc<EmbeddingSelector>,
    store: Arc<DocumentStore>,
    index: Arc<IndexHandle<DocumentId>>,
    ingestor: Ingestor,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    metrics: Arc<dyn EngineMetrics>,
    rebuild_lock: Mutex<()>,
    total_queries: AtomicU64,
    total_query_micros: AtomicU64,
}

impl RagEngine {
    /// Validates `config`, builds the embedding models and the generator it names.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let selector = EmbeddingSelector::from_config(&config.embedding)?;
        let generator = generator_from_config(&config.generator)?;
        Ok(Self::from_parts(config, Arc::new(selector)).with_generator(generator))
    }

    /// Wires an engine around an already built selector.
    ///
    /// The index dimension follows `selector.dimension()`. The generator
    /// defaults to [`TemplateGenerator`].
    pub fn from_parts(config: EngineConfig, selector: Arc<EmbeddingSelector>) -> Self {
        let store = Arc::new(DocumentStore::new());
        let index = Arc::new(IndexHandle::new(selector.dimension()));
        let ingestor = Ingestor::new(
            Arc::clone(&selector),
            Arc::clone(&store),
            config.ingest_config(),
        );
        let retriever = Retriever::new(
            Arc::clone(&selector),
            Arc::clone(&store),
            Arc::clone(&index),
            config.retrieval.clone(),
            config.languages.clone(),
        );
        Self {
            config,
            selector,
            store,
            index,
            ingestor,
            retriever,
            generator: Arc::new(TemplateGenerator),
            metrics: Arc::new(NoopMetrics),
            rebuild_lock: Mutex::new(()),
            total_queries: AtomicU64::new(0),
            total_query_micros: AtomicU64::new(0),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selector(&self) -> &Arc<EmbeddingSelector> {
        &self.selector
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<IndexHandle<DocumentId>> {
        &self.index
    }

    /// Embeds and stores `batch`. Records are not searchable until the next rebuild.
    pub async fn ingest(&self, batch: Vec<RawDocument>) -> Result<IngestSummary, EngineError> {
        let span = MetricsSpan::start(&self.metrics);
        let summary = self.ingestor.ingest(batch).await?;
        for _ in 0..summary.degraded {
            self.metrics.record_degraded("ingest");
        }
        span.record_ingest(summary.accepted, summary.rejected);
        Ok(summary)
    }

    /// Rebuilds the index from every indexable record in the store and swaps it in.
    ///
    /// Records are partitioned by the model that embedded them; vectors from
    /// a model the selector cannot run at query time are left out.
    /// Concurrent calls are serialized; queries keep running against the
    /// previous snapshot until the swap.
    pub async fn rebuild_index(&self) -> Result<IndexStats, EngineError> {
        let _guard = self.rebuild_lock.lock().await;
        let span = MetricsSpan::start(&self.metrics);
        let dimension = self.selector.dimension();

        let mut partitions: Vec<Partition<DocumentId>> = Vec::new();
        let mut skipped = 0usize;
        let mut unservable = 0usize;
        for record in self.store.all() {
            let usable = record.is_indexable(dimension)
                && record.embedding.as_ref().is_some_and(|e| {
                    e.vector.iter().all(|x| x.is_finite()) && e.vector.iter().any(|x| *x != 0.0)
                });
            let Some(embedding) = record.embedding.as_ref().filter(|_| usable) else {
                skipped += 1;
                continue;
            };
            if self.selector.model(&embedding.model_name).is_none() {
                unservable += 1;
                continue;
            }
            let vector = embedding.vector.clone();
            match partitions
                .iter_mut()
                .find(|p| p.model == embedding.model_name)
            {
                Some(partition) => partition.push(vector, record.id),
                None => {
                    let mut partition = Partition::new(embedding.model_name.clone());
                    partition.push(vector, record.id);
                    partitions.push(partition);
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, dimension, "engine.rebuild_skipped_records");
        }
        if unservable > 0 {
            warn!(records = unservable, "engine.rebuild_unknown_model");
        }
        let skipped = skipped + unservable;

        let index = Arc::clone(&self.index);
        let config = IndexConfig::new()
            .with_dimension(dimension)
            .with_ann(self.config.index.ann);
        let snapshot = tokio::task::spawn_blocking(move || index.rebuild(partitions, &config))
            .instrument(tracing::span!(Level::INFO, "engine.rebuild"))
            .await??;

        let stats = snapshot.stats();
        info!(
            vectors = stats.len,
            models = stats.models,
            generation = stats.generation,
            ann = stats.ann,
            skipped,
            elapsed_micros = span.elapsed().as_micros() as u64,
            "engine.rebuild_done"
        );
        span.record_rebuild(stats.len);
        Ok(stats)
    }

    /// Answers `query` from the current index snapshot.
    ///
    /// No matching source is still `Ok`: the response carries the
    /// no-relevant-source answer and zero confidence.
    pub async fn query(&self, query: Query) -> Result<RagResponse, EngineError> {
        let span = MetricsSpan::start(&self.metrics);
        let found = self.retriever.retrieve(&query).await?;
        let response = assemble(
            &query,
            found,
            self.generator.as_ref(),
            &self.config.retrieval,
        )
        .await;

        let meta = &response.processing_metadata;
        let degraded = meta.query_degraded
            || matches!(meta.answer_status, GenerationStatus::Degraded { .. })
            || matches!(meta.follow_up_status, GenerationStatus::Degraded { .. });
        if meta.query_degraded {
            self.metrics.record_degraded("query_embedding");
        }
        if matches!(meta.answer_status, GenerationStatus::Degraded { .. }) {
            self.metrics.record_degraded("answer");
        }

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.total_query_micros
            .fetch_add(span.elapsed().as_micros() as u64, Ordering::Relaxed);
        span.record_query(response.sources.len(), degraded);
        Ok(response)
    }

    /// Loads `<dir>/<category>/*.json`, ingests it and rebuilds the index.
    ///
    /// Bad files are reported in the result rather than failing the load.
    pub async fn load_corpus(&self, dir: impl AsRef<Path>) -> Result<CorpusReport, EngineError> {
        let dir = dir.as_ref().to_path_buf();
        let load = tokio::task::spawn_blocking(move || load_corpus_dir(dir)).await??;
        let files_read = load.files_read;
        let file_errors = load.errors.iter().map(ToString::to_string).collect();
        let ingest = self.ingest(load.documents).await?;
        let index = self.rebuild_index().await?;
        Ok(CorpusReport {
            files_read,
            file_errors,
            ingest,
            index,
        })
    }

    pub fn stats(&self) -> EngineStats {
        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let micros = self.total_query_micros.load(Ordering::Relaxed);
        let avg_response_time_ms = if total_queries == 0 {
            0.0
        } else {
            micros as f64 / total_queries as f64 / 1000.0
        };
        let snapshot = self.index.snapshot();
        EngineStats {
            total_queries,
            avg_response_time_ms,
            documents: self.store.len(),
            indexed_vectors: snapshot.len(),
            index_generation: snapshot.generation(),
        }
    }

    /// Ingest failures rendered for logs or CLI output.
    pub fn describe_failures(failures: &[IngestFailure]) -> Vec<String> {
        failures
            .iter()
            .map(|f| format!("document {}: {}", f.position, f.error))
            .collect()
    }
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("documents", &self.store.len())
            .field("index", &self.index)
            .field("generator", &self.generator.name())
            .finish()
    }
}

fn generator_from_config(cfg: &GeneratorConfig) -> Result<Arc<dyn Generator>, ConfigError> {
    Ok(match cfg.kind {
        GeneratorKind::Template => Arc::new(TemplateGenerator),
        GeneratorKind::None => Arc::new(UnavailableGenerator::default()),
        GeneratorKind::Http => {
            let url = cfg.url.clone().unwrap_or_default();
            let generator = HttpGenerator::new(url, cfg.model.clone())
                .map_err(|e| ConfigError::Validation(format!("generator: {e}")))?
                .with_auth_header(cfg.auth_header.clone())
                .with_max_tokens(cfg.max_tokens)
                .with_retry(cfg.retry);
            Arc::new(generator)
        }
    })
}
