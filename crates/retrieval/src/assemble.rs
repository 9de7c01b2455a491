use std::time::Instant;

use tracing::{info, warn};

use crate::generate::{Generation, GenerationRequest, Generator};
use crate::types::{
    Candidate, GenerationStatus, ProcessingMetadata, Query, RagResponse, Retrieval,
    RetrievalConfig, Source,
};

pub const NO_RELEVANT_SOURCE_ANSWER: &str = "No relevant source was found for this question. \
     Try rephrasing it or removing the jurisdiction or domain filter.";

const CONTEXT_SNIPPETS: usize = 3;

/// Clamped linear map of `top_score` from `[floor, ceiling]` onto `[0, 1]`.
pub fn confidence(top_score: Option<f32>, floor: f32, ceiling: f32) -> f32 {
    let Some(score) = top_score.filter(|s| s.is_finite()) else {
        return 0.0;
    };
    if ceiling <= floor {
        return if score >= ceiling { 1.0 } else { 0.0 };
    }
    ((score - floor) / (ceiling - floor)).clamp(0.0, 1.0)
}

/// Builds the response for `retrieval`.
///
/// The generator is asked for an answer and follow-ups only when there is
/// evidence. A degraded answer is replaced with an extractive one; degraded
/// follow-ups become an empty list. Neither fails the call.
pub async fn assemble(
    query: &Query,
    retrieval: Retrieval,
    generator: &dyn Generator,
    config: &RetrievalConfig,
) -> RagResponse {
    let start = Instant::now();
    let candidates = &retrieval.candidates;

    let (answer, answer_status, follow_up_questions, follow_up_status) = if candidates.is_empty() {
        (
            NO_RELEVANT_SOURCE_ANSWER.to_string(),
            GenerationStatus::Skipped,
            Vec::new(),
            GenerationStatus::Skipped,
        )
    } else {
        let request = GenerationRequest {
            query,
            language: &retrieval.language,
            candidates,
        };
        let answer = Generation::from_result(generator.answer(request).await);
        let follow_ups = Generation::from_result(generator.follow_ups(request).await);
        if let Generation::Degraded(reason) = &answer {
            warn!(generator = generator.name(), %reason, "assemble.answer_degraded");
        }
        if let Generation::Degraded(reason) = &follow_ups {
            warn!(generator = generator.name(), %reason, "assemble.follow_ups_degraded");
        }
        let answer_status = answer.status();
        let follow_up_status = follow_ups.status();
        (
            answer
                .ok()
                .unwrap_or_else(|| extractive_answer(candidates, config.excerpt_chars)),
            answer_status,
            follow_ups.ok().unwrap_or_default(),
            follow_up_status,
        )
    };

    let sources: Vec<Source> = candidates
        .iter()
        .map(|c| Source {
            id: c.id,
            rank: c.rank,
            score: c.score,
            jurisdiction: c.record.jurisdiction.clone(),
            domain: c.record.domain.clone(),
            language: c.record.language.clone(),
            excerpt: c.record.excerpt(config.excerpt_chars),
            metadata: c.record.metadata.clone(),
        })
        .collect();

    let confidence = confidence(
        retrieval.top_score(),
        config.confidence_floor,
        config.confidence_ceiling,
    );

    let processing_metadata = ProcessingMetadata {
        query_language: retrieval.language.clone(),
        embedding_model: retrieval.query_embedding.model_name.clone(),
        query_degraded: retrieval.query_embedding.degraded,
        index_generation: retrieval.index_generation,
        indexed_vectors: retrieval.indexed_vectors,
        models_searched: retrieval.models_searched.clone(),
        candidates_searched: retrieval.searched,
        candidates_above_threshold: retrieval.above_threshold,
        candidates_returned: candidates.len(),
        filters_applied: !query.filters.is_empty(),
        generator: generator.name().to_string(),
        answer_status,
        follow_up_status,
        retrieval_micros: retrieval.elapsed.as_micros() as u64,
        assembly_micros: start.elapsed().as_micros() as u64,
    };

    info!(
        sources = sources.len(),
        confidence,
        elapsed_micros = processing_metadata.assembly_micros,
        "assemble.response"
    );

    RagResponse {
        answer,
        confidence,
        legal_context: legal_context(candidates),
        sources,
        follow_up_questions,
        processing_metadata,
    }
}

/// Answer quoted from the sources when no generator output is available.
pub fn extractive_answer(candidates: &[Candidate], excerpt_chars: usize) -> String {
    let Some(top) = candidates.first() else {
        return NO_RELEVANT_SOURCE_ANSWER.to_string();
    };
    let mut answer = format!(
        "The most relevant source ({}, {} law) states: {}",
        top.record.jurisdiction,
        top.record.domain,
        top.record.excerpt(excerpt_chars)
    );
    if candidates.len() > 1 {
        answer.push_str(&format!(
            " See the {} additional source(s) listed below.",
            candidates.len() - 1
        ));
    }
    answer
}

// One line per distinct jurisdiction/domain pair, in rank order.
fn legal_context(candidates: &[Candidate]) -> Vec<String> {
    let mut seen: Vec<(&str, &str)> = Vec::new();
    let mut out = Vec::new();
    for c in candidates {
        let key = (c.record.jurisdiction.as_str(), c.record.domain.as_str());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        let label = c
            .record
            .metadata
            .get("category")
            .and_then(|v| v.as_str())
            .map(|cat| format!(" [{cat}]"))
            .unwrap_or_default();
        out.push(format!(
            "{} / {}{}: {}",
            key.0,
            key.1,
            label,
            c.record.excerpt(160)
        ));
        if out.len() == CONTEXT_SNIPPETS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{TemplateGenerator, UnavailableGenerator};
    use ingest::{DocumentStore, NewDocument};
    use semantic::{EmbedPurpose, SelectedEmbedding};
    use serde_json::Map;
    use std::time::Duration;

    fn embedding() -> SelectedEmbedding {
        SelectedEmbedding {
            vector: vec![1.0, 0.0],
            model_name: "hash".into(),
            purpose: EmbedPurpose::Query,
            degraded: false,
        }
    }

    fn retrieval(docs: &[(&str, &str, &str, f32)]) -> Retrieval {
        let store = DocumentStore::new();
        let candidates = docs
            .iter()
            .enumerate()
            .map(|(rank, (content, jurisdiction, domain, score))| {
                let id = store
                    .add(NewDocument {
                        content: content.to_string(),
                        metadata: Map::new(),
                        jurisdiction: jurisdiction.to_string(),
                        domain: domain.to_string(),
                        language: "en".into(),
                        embedding: None,
                    })
                    .unwrap();
                Candidate {
                    id,
                    score: *score,
                    rank,
                    record: store.get(id).unwrap(),
                }
            })
            .collect();
        Retrieval {
            candidates,
            query_embedding: embedding(),
            language: "en".into(),
            index_generation: 1,
            indexed_vectors: docs.len(),
            models_searched: vec!["test-model".into()],
            searched: docs.len(),
            above_threshold: docs.len(),
            elapsed: Duration::from_micros(5),
        }
    }

    #[test]
    fn confidence_mapping() {
        assert_eq!(confidence(None, 0.0, 1.0), 0.0);
        assert_eq!(confidence(Some(0.5), 0.0, 1.0), 0.5);
        assert_eq!(confidence(Some(1.2), 0.0, 1.0), 1.0);
        assert_eq!(confidence(Some(-0.2), 0.0, 1.0), 0.0);
        assert!((confidence(Some(0.6), 0.3, 0.9) - 0.5).abs() < 1e-6);
        assert_eq!(confidence(Some(f32::NAN), 0.0, 1.0), 0.0);
    }

    #[test]
    fn confidence_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=20 {
            let c = confidence(Some(i as f32 / 20.0), 0.2, 0.8);
            assert!(c >= last);
            last = c;
        }
    }

    #[tokio::test]
    async fn empty_retrieval_gives_no_source_answer() {
        let r = retrieval(&[]);
        let resp = assemble(&Query::new("q"), r, &TemplateGenerator, &RetrievalConfig::default()).await;
        assert_eq!(resp.answer, NO_RELEVANT_SOURCE_ANSWER);
        assert_eq!(resp.confidence, 0.0);
        assert!(resp.sources.is_empty());
        assert!(resp.follow_up_questions.is_empty());
        assert_eq!(resp.processing_metadata.answer_status, GenerationStatus::Skipped);
    }

    #[tokio::test]
    async fn sources_keep_rank_order() {
        let r = retrieval(&[
            ("first", "CA", "housing", 0.9),
            ("second", "NY", "labor", 0.7),
            ("third", "CA", "housing", 0.5),
        ]);
        let resp = assemble(&Query::new("q"), r, &TemplateGenerator, &RetrievalConfig::default()).await;
        let excerpts: Vec<&str> = resp.sources.iter().map(|s| s.excerpt.as_str()).collect();
        assert_eq!(excerpts, vec!["first", "second", "third"]);
        assert!((resp.confidence - 0.9).abs() < 1e-6);
        assert_eq!(resp.legal_context.len(), 2);
        assert!(resp.legal_context[0].starts_with("CA / housing"));
        assert_eq!(resp.follow_up_questions.len(), 3);
    }

    #[tokio::test]
    async fn unavailable_generator_degrades_without_failing() {
        let r = retrieval(&[("A landlord must give notice.", "CA", "housing", 0.8)]);
        let resp = assemble(
            &Query::new("q"),
            r,
            &UnavailableGenerator::default(),
            &RetrievalConfig::default(),
        )
        .await;
        assert!(resp.answer.contains("A landlord must give notice."));
        assert!(resp.follow_up_questions.is_empty());
        assert!(matches!(
            resp.processing_metadata.follow_up_status,
            GenerationStatus::Degraded { .. }
        ));
        assert!(matches!(
            resp.processing_metadata.answer_status,
            GenerationStatus::Degraded { .. }
        ));
        assert_eq!(resp.sources.len(), 1);
    }

    #[tokio::test]
    async fn response_serializes() {
        let r = retrieval(&[("text", "federal", "general", 0.4)]);
        let resp = assemble(&Query::new("q"), r, &TemplateGenerator, &RetrievalConfig::default()).await;
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["sources"][0]["jurisdiction"], "federal");
        assert_eq!(json["processing_metadata"]["answer_status"]["status"], "ok");
    }

    #[test]
    fn extractive_answer_mentions_extra_sources() {
        let r = retrieval(&[("one", "CA", "housing", 0.9), ("two", "CA", "housing", 0.8)]);
        let text = extractive_answer(&r.candidates, 300);
        assert!(text.contains("(CA, housing law)"));
        assert!(text.contains("1 additional source"));
    }
}
