//! Best-effort text generation for answers and follow-up questions.
//!
//! Generation never fails a query. Every call comes back as a
//! [`Generation`]: either the produced value or a degradation reason that
//! the assembler records and works around.

use std::time::Duration;

use async_trait::async_trait;
use semantic::retry::{execute_with_retry_async, RetryConfig};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::types::{Candidate, GenerationStatus, Query};

const MAX_FOLLOW_UPS: usize = 3;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("generation unavailable: {0}")]
    Unavailable(String),
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Tagged result of a best-effort call.
///
/// `Ok(vec![])` means the generator ran and had nothing to say;
/// `Degraded(_)` means it could not run.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation<T> {
    Ok(T),
    Degraded(String),
}

impl<T> Generation<T> {
    pub fn from_result(result: Result<T, GenerationError>) -> Self {
        match result {
            Ok(value) => Generation::Ok(value),
            Err(err) => Generation::Degraded(err.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Generation::Degraded(_))
    }

    pub fn status(&self) -> GenerationStatus {
        match self {
            Generation::Ok(_) => GenerationStatus::Ok,
            Generation::Degraded(reason) => GenerationStatus::Degraded {
                reason: reason.clone(),
            },
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Generation::Ok(value) => Some(value),
            Generation::Degraded(_) => None,
        }
    }
}

/// Input handed to a generator: the query plus the ranked evidence.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub query: &'a Query,
    pub language: &'a str,
    pub candidates: &'a [Candidate],
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Name recorded in processing metadata.
    fn name(&self) -> &str;

    async fn answer(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError>;

    async fn follow_ups(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<String>, GenerationError>;
}

/// Deterministic offline generator built from the top sources.
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator;

#[async_trait]
impl Generator for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn answer(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let Some(top) = request.candidates.first() else {
            return Err(GenerationError::InvalidResponse(
                "no sources to answer from".into(),
            ));
        };
        let record = &top.record;
        let mut answer = format!(
            "Regarding \"{}\": the most relevant {} {} material ({}) states: {}",
            request.query.text.trim(),
            record.jurisdiction,
            record.domain,
            top.id,
            record.excerpt(240)
        );
        let others = request.candidates.len() - 1;
        if others > 0 {
            answer.push_str(&format!(
                " {others} further source{} may also apply.",
                if others == 1 { "" } else { "s" }
            ));
        }
        Ok(answer)
    }

    async fn follow_ups(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<String>, GenerationError> {
        let Some(top) = request.candidates.first() else {
            return Ok(Vec::new());
        };
        let jurisdiction = &top.record.jurisdiction;
        let domain = &top.record.domain;
        Ok(vec![
            format!("What deadlines apply to this {domain} matter in {jurisdiction}?"),
            format!("Are there exceptions under {jurisdiction} law that could change the outcome?"),
            "What documents or evidence should I gather before taking action?".to_string(),
        ])
    }
}

/// Generator that is never available. Every response degrades.
#[derive(Debug, Clone)]
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableGenerator {
    fn default() -> Self {
        Self::new("no generator configured")
    }
}

#[async_trait]
impl Generator for UnavailableGenerator {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn answer(&self, _request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable(self.reason.clone()))
    }

    async fn follow_ups(
        &self,
        _request: GenerationRequest<'_>,
    ) -> Result<Vec<String>, GenerationError> {
        Err(GenerationError::Unavailable(self.reason.clone()))
    }
}

/// Completion endpoint reached over HTTP.
///
/// Sends `{"model", "prompt", "max_tokens"}` and accepts `text`,
/// `generated_text`, `choices[0].text` or `choices[0].message.content`.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    url: String,
    model: String,
    auth_header: Option<String>,
    max_tokens: u32,
    retry: RetryConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self, GenerationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(GenerationError::Unavailable(
                "generator url is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            url,
            model: model.into(),
            auth_header: None,
            max_tokens: 512,
            retry: RetryConfig::default(),
            client,
        })
    }

    pub fn with_auth_header(mut self, header: Option<String>) -> Self {
        self.auth_header = header;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": self.max_tokens,
        });
        let outcome = execute_with_retry_async(&self.retry, |attempt| {
            let payload = &payload;
            async move {
                if attempt > 0 {
                    warn!(model = %self.model, attempt, "generate.http_retry");
                }
                self.send(payload).await
            }
        })
        .await;
        let response = outcome.into_result().map_err(GenerationError::Transport)?;
        extract_completion(response)
    }

    async fn send(&self, payload: &Value) -> Result<Value, String> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(header) = self.auth_header.as_deref() {
            request = request.header("Authorization", header);
        }
        let response = request
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {e}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP error {status}: {body}"));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| format!("invalid JSON response: {e}"))
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn answer(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let prompt = format!(
            "{}\nAnswer the question using only the sources above. Cite sources by id. \
             Respond in language '{}'.\nQuestion: {}\nAnswer:",
            render_sources(request.candidates),
            request.language,
            request.query.text.trim()
        );
        let text = self.complete(prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::InvalidResponse("empty completion".into()));
        }
        Ok(text.to_string())
    }

    async fn follow_ups(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<Vec<String>, GenerationError> {
        let prompt = format!(
            "{}\nSuggest up to {MAX_FOLLOW_UPS} short follow-up questions a client might ask \
             next, one per line, in language '{}'.\nQuestion: {}\nFollow-up questions:",
            render_sources(request.candidates),
            request.language,
            request.query.text.trim()
        );
        Ok(parse_follow_ups(&self.complete(prompt).await?))
    }
}

fn render_sources(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "[{}] ({}, {}) {}",
                c.id,
                c.record.jurisdiction,
                c.record.domain,
                c.record.excerpt(600)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_completion(value: Value) -> Result<String, GenerationError> {
    let text = match &value {
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("generated_text"))
            .or_else(|| {
                let choice = map.get("choices")?.get(0)?;
                choice
                    .get("text")
                    .or_else(|| choice.get("message")?.get("content"))
            }),
        Value::Array(items) => items.first().and_then(|item| item.get("generated_text")),
        _ => None,
    };
    text.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GenerationError::InvalidResponse("unsupported completion shape".into()))
}

/// One question per line; list markers are stripped.
fn parse_follow_ups(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')' | ' ')
                })
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_FOLLOW_UPS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{DocumentStore, NewDocument};
    use serde_json::Map;
    use std::sync::Arc;
    use semantic::test_helpers::one_shot_server;

    fn candidates() -> Vec<Candidate> {
        let store = DocumentStore::new();
        let id = store
            .add(NewDocument {
                content: "A landlord must serve a three-day notice before filing.".into(),
                metadata: Map::new(),
                jurisdiction: "CA".into(),
                domain: "housing".into(),
                language: "en".into(),
                embedding: None,
            })
            .unwrap();
        vec![Candidate {
            id,
            score: 0.8,
            rank: 0,
            record: store.get(id).unwrap(),
        }]
    }

    fn request<'a>(query: &'a Query, candidates: &'a [Candidate]) -> GenerationRequest<'a> {
        GenerationRequest {
            query,
            language: "en",
            candidates,
        }
    }

    #[tokio::test]
    async fn template_answer_cites_top_source() {
        let q = Query::new("How do I evict a tenant?");
        let c = candidates();
        let answer = TemplateGenerator.answer(request(&q, &c)).await.unwrap();
        assert!(answer.contains("CA housing"));
        assert!(answer.contains("three-day notice"));
        assert!(answer.contains(&c[0].id.to_string()));
    }

    #[tokio::test]
    async fn template_follow_ups_mention_jurisdiction() {
        let q = Query::new("eviction");
        let c = candidates();
        let qs = TemplateGenerator.follow_ups(request(&q, &c)).await.unwrap();
        assert_eq!(qs.len(), 3);
        assert!(qs[0].contains("CA"));
    }

    #[tokio::test]
    async fn unavailable_generator_degrades() {
        let q = Query::new("x");
        let g = UnavailableGenerator::default();
        let result = Generation::from_result(g.answer(request(&q, &[])).await);
        assert!(result.is_degraded());
        assert!(matches!(result.status(), GenerationStatus::Degraded { reason } if reason.contains("no generator")));
    }

    #[test]
    fn generation_ok_is_distinct_from_degraded_empty() {
        let empty: Generation<Vec<String>> = Generation::Ok(Vec::new());
        assert!(!empty.is_degraded());
        assert_eq!(empty.ok(), Some(Vec::new()));
    }

    #[test]
    fn extract_completion_shapes() {
        for body in [
            json!({"text": "a"}),
            json!({"generated_text": "a"}),
            json!({"choices": [{"text": "a"}]}),
            json!({"choices": [{"message": {"content": "a"}}]}),
            json!([{"generated_text": "a"}]),
        ] {
            assert_eq!(extract_completion(body).unwrap(), "a");
        }
        assert!(extract_completion(json!({"other": 1})).is_err());
    }

    #[test]
    fn follow_up_lines_are_cleaned() {
        let parsed = parse_follow_ups("1. First?\n- Second?\n\n* Third?\n4) Fourth?");
        assert_eq!(parsed, vec!["First?", "Second?", "Third?"]);
    }

    #[tokio::test]
    async fn http_generator_reads_completion() {
        let url = one_shot_server("200 OK", r#"{"choices":[{"text":"  Serve notice first.  "}]}"#, "/generate").await;
        let g = HttpGenerator::new(url, "legal-llm").unwrap();
        let q = Query::new("eviction");
        let c = candidates();
        assert_eq!(g.answer(request(&q, &c)).await.unwrap(), "Serve notice first.");
        assert_eq!(g.name(), "legal-llm");
    }

    #[tokio::test]
    async fn http_generator_error_is_transport() {
        let url = one_shot_server("400 Bad Request", r#"{"error":"bad"}"#, "/generate").await;
        let g = HttpGenerator::new(url, "legal-llm")
            .unwrap()
            .with_retry(RetryConfig::default().with_max_retries(0));
        let q = Query::new("eviction");
        let c = candidates();
        let err = g.answer(request(&q, &c)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }

    #[test]
    fn empty_url_rejected() {
        assert!(HttpGenerator::new(" ", "m").is_err());
    }
}
