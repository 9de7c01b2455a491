use std::sync::Arc;
use std::time::Instant;

use index::{IndexHandle, IndexSnapshot, ScoredId};
use ingest::{DocumentId, DocumentStore, LanguagePolicy};
use semantic::{EmbedPurpose, EmbeddingSelector, SelectedEmbedding};
use tracing::{debug, info, warn};

use crate::types::{Candidate, Query, Retrieval, RetrievalConfig, RetrievalError};


/// Turns a query into ranked, filtered candidates.
///
/// Reads one index snapshot per call, so a concurrent rebuild never mixes
/// two generations into one result. Each partition of the snapshot is
/// searched with a query vector from its own model, and the per-model hits
/// are merged by score.
pub struct Retriever {
    selector: Arc<EmbeddingSelector>,
    store: Arc<DocumentStore>,
    index: Arc<IndexHandle<DocumentId>>,
    config: RetrievalConfig,
    languages: LanguagePolicy,
}

impl Retriever {
    pub fn new(
        selector: Arc<EmbeddingSelector>,
        store: Arc<DocumentStore>,
        index: Arc<IndexHandle<DocumentId>>,
        config: RetrievalConfig,
        languages: LanguagePolicy,
    ) -> Self {
        Self {
            selector,
            store,
            index,
            config,
            languages,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieves with the configured `max_retrieved_docs` and `min_relevance_score`.
    pub async fn retrieve(&self, query: &Query) -> Result<Retrieval, RetrievalError> {
        self.retrieve_with(
            query,
            self.config.max_retrieved_docs,
            self.config.min_relevance_score,
        )
        .await
    }

    /// Embed, search top `k`, drop scores below `min_score`, then filter.
    ///
    /// Filters run after ranking so relevance is always computed over the
    /// whole corpus; a filter can only shrink the result.
    pub async fn retrieve_with(
        &self,
        query: &Query,
        k: usize,
        min_score: f32,
    ) -> Result<Retrieval, RetrievalError> {
        let start = Instant::now();
        let text = query.text.trim();
        if text.is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query text must not be empty".into(),
            ));
        }

        let language = self.languages.resolve(query.language.as_deref());
        if let Some(requested) = query.language.as_deref() {
            if !requested.trim().eq_ignore_ascii_case(&language) {
                warn!(requested, fallback = %language, "retrieval.language_fallback");
            }
        }

        let embedding = self
            .selector
            .select_and_embed(text, EmbedPurpose::Query)
            .await?;

        let snapshot = self.index.snapshot();
        let mut retrieval = Retrieval {
            candidates: Vec::new(),
            query_embedding: embedding,
            language,
            index_generation: snapshot.generation(),
            indexed_vectors: snapshot.len(),
            models_searched: Vec::new(),
            searched: 0,
            above_threshold: 0,
            elapsed: start.elapsed(),
        };

        // A zero vector ranks every document equally; treat it as no signal.
        if retrieval.query_embedding.degraded {
            warn!(model = %retrieval.query_embedding.model_name, "retrieval.degraded_query");
            return Ok(retrieval);
        }

        let (hits, models) = self
            .search_partitions(&snapshot, text, &retrieval.query_embedding, k)
            .await?;
        retrieval.searched = hits.len();
        retrieval.models_searched = models;

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits.into_iter().filter(|h| h.score >= min_score) {
            retrieval.above_threshold += 1;
            let Some(record) = self.store.get(hit.id) else {
                warn!(id = %hit.id, "retrieval.dangling_id");
                continue;
            };
            if !query.filters.matches(&record) {
                debug!(id = %hit.id, "retrieval.filtered");
                continue;
            }
            candidates.push(Candidate {
                id: hit.id,
                score: hit.score,
                rank: candidates.len(),
                record,
            });
        }
        retrieval.candidates = candidates;
        retrieval.elapsed = start.elapsed();

        info!(
            k,
            min_score,
            searched = retrieval.searched,
            above_threshold = retrieval.above_threshold,
            returned = retrieval.candidates.len(),
            top_score = retrieval.top_score().unwrap_or(0.0),
            generation = retrieval.index_generation,
            models = retrieval.models_searched.len(),
            elapsed_micros = retrieval.elapsed.as_micros() as u64,
            "retrieval.retrieve"
        );
        Ok(retrieval)
    }

    /// Top `k` over every partition, each scored in its own model's space.
    ///
    /// The primary embedding serves the partition of the model that produced
    /// it; other partitions get the query re-embedded with their model. A
    /// partition whose model is gone is skipped. Equal scores favour the
    /// primary partition, then partition order, then index order.
    async fn search_partitions(
        &self,
        snapshot: &IndexSnapshot<DocumentId>,
        text: &str,
        primary: &SelectedEmbedding,
        k: usize,
    ) -> Result<(Vec<ScoredId<DocumentId>>, Vec<String>), RetrievalError> {
        let mut merged: Vec<(usize, ScoredId<DocumentId>)> = Vec::new();
        let mut models = Vec::new();

        if let Some(index) = snapshot.get(&primary.model_name) {
            merged.extend(index.search(&primary.vector, k)?.into_iter().map(|h| (0, h)));
            models.push(primary.model_name.clone());
        }

        for (rank, (model, index)) in snapshot.partitions().enumerate() {
            if model == primary.model_name {
                continue;
            }
            let embedding = match self
                .selector
                .embed_with(model, text, EmbedPurpose::Query)
                .await
            {
                Ok(embedding) => embedding,
                Err(err) => {
                    warn!(model, error = %err, "retrieval.partition_skipped");
                    continue;
                }
            };
            merged.extend(
                index
                    .search(&embedding.vector, k)?
                    .into_iter()
                    .map(|h| (rank + 1, h)),
            );
            models.push(model.to_string());
        }

        merged.sort_by(|(ra, a), (rb, b)| {
            b.score
                .total_cmp(&a.score)
                .then(ra.cmp(rb))
                .then(a.position.cmp(&b.position))
        });
        merged.truncate(k);
        debug!(partitions = models.len(), hits = merged.len(), "retrieval.merge");
        Ok((merged.into_iter().map(|(_, h)| h).collect(), models))
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("store", &self.store)
            .field("index", &self.index)
            .field("config", &self.config)
            .finish()
    }
}
