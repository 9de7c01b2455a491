use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use crate::model::EmbeddingModel;
use crate::normalize::l2_normalize_in_place;
use crate::retry::{execute_with_retry_async, RetryConfig};
use crate::{ModelDescriptor, SemanticError};

/// Payload dialect spoken by the remote endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    /// `{"inputs": "..."}`, HuggingFace feature-extraction pipeline.
    HuggingFace,
    /// `{"input": "...", "model": "..."}`, OpenAI-style embeddings.
    OpenAi,
    /// `{"text": "..."}`
    #[default]
    Custom,
}

impl ApiProvider {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "hf" | "huggingface" => ApiProvider::HuggingFace,
            "openai" | "gpt" => ApiProvider::OpenAi,
            _ => ApiProvider::Custom,
        }
    }
}

/// Embedding model served over HTTP.
#[derive(Debug, Clone)]
pub struct ApiModel {
    descriptor: ModelDescriptor,
    url: String,
    provider: ApiProvider,
    auth_header: Option<String>,
    normalize: bool,
    retry: RetryConfig,
    client: reqwest::Client,
}

impl ApiModel {
    pub fn new(descriptor: ModelDescriptor, url: impl Into<String>) -> Result<Self, SemanticError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(SemanticError::InvalidConfig(format!(
                "api url is required for model '{}'",
                descriptor.name
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| SemanticError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            descriptor,
            url,
            provider: ApiProvider::default(),
            auth_header: None,
            normalize: false,
            retry: RetryConfig::default(),
            client,
        })
    }

    pub fn with_provider(mut self, provider: ApiProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_auth_header(mut self, header: Option<String>) -> Self {
        self.auth_header = header;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_payload(&self, text: &str) -> Value {
        match self.provider {
            ApiProvider::HuggingFace => json!({ "inputs": text }),
            ApiProvider::OpenAi => json!({ "input": text, "model": self.descriptor.name }),
            ApiProvider::Custom => json!({ "text": text }),
        }
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
impl EmbeddingModel for ApiModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let payload = self.build_payload(text);
        let outcome = execute_with_retry_async(&self.retry, |attempt| {
            let payload = &payload;
            async move {
                if attempt > 0 {
                    warn!(model = %self.descriptor.name, attempt, "semantic.api_retry");
                }
                self.send(payload).await
            }
        })
        .await;

        let attempts = outcome.attempts;
        let response = outcome.into_result().map_err(|e| {
            warn!(model = %self.descriptor.name, attempts, error = %e, "semantic.api_failure");
            SemanticError::Transport(e)
        })?;

        let mut vectors = parse_embeddings_from_value(response)?;
        let mut vector = match vectors.len() {
            0 => {
                return Err(SemanticError::Inference(
                    "API response did not contain embeddings".into(),
                ))
            }
            _ => vectors.swap_remove(0),
        };
        if self.normalize {
            l2_normalize_in_place(&mut vector);
        }
        Ok(vector)
    }
}

fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }
            if let Some(embedding) = map.remove("embedding") {
                return parse_embedding_vector(embedding).map(|v| vec![v]);
            }
            if let Some(Value::Array(items)) = map.remove("data") {
                return items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(mut obj) => obj
                            .remove("embedding")
                            .ok_or_else(|| {
                                SemanticError::Inference(
                                    "missing `embedding` field in data item".into(),
                                )
                            })
                            .and_then(parse_embedding_vector),
                        _ => Err(SemanticError::Inference(
                            "unexpected entry inside `data` array".into(),
                        )),
                    })
                    .collect();
            }
            Err(SemanticError::Inference(
                "unsupported API response shape".into(),
            ))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Vec::new())
            } else if items.iter().all(|item| matches!(item, Value::Array(_))) {
                items.into_iter().map(parse_embedding_vector).collect()
            } else {
                parse_embedding_vector(Value::Array(items)).map(|vec| vec![vec])
            }
        }
        other => parse_embedding_vector(other).map(|vec| vec![vec]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, SemanticError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SemanticError::Inference("non-finite embedding value".into())),
                other => Err(SemanticError::Inference(format!(
                    "embedding entries must be numbers, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(SemanticError::Inference(format!(
            "embedding vector must be an array, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelRole;
    use crate::test_helpers::one_shot_server;

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new("remote-mini", 3, ModelRole::General)
    }

    #[test]
    fn provider_parsing() {
        assert_eq!(ApiProvider::parse("HF"), ApiProvider::HuggingFace);
        assert_eq!(ApiProvider::parse("openai"), ApiProvider::OpenAi);
        assert_eq!(ApiProvider::parse("anything"), ApiProvider::Custom);
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = ApiModel::new(descriptor(), "  ").unwrap_err();
        assert!(matches!(err, SemanticError::InvalidConfig(_)));
    }

    #[test]
    fn payload_shapes_follow_provider() {
        let model = ApiModel::new(descriptor(), "http://localhost/embed").unwrap();
        assert_eq!(model.build_payload("x"), json!({ "text": "x" }));
        let hf = model.clone().with_provider(ApiProvider::HuggingFace);
        assert_eq!(hf.build_payload("x"), json!({ "inputs": "x" }));
        let openai = model.with_provider(ApiProvider::OpenAi);
        assert_eq!(
            openai.build_payload("x"),
            json!({ "input": "x", "model": "remote-mini" })
        );
    }

    #[test]
    fn parse_embedding_collection_various_formats() {
        let nested = parse_embedding_collection(json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0], vec![1.0, 2.0, 3.0]);

        let flat = parse_embedding_collection(json!([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(flat, vec![vec![1.0, 2.0, 3.0]]);

        assert!(parse_embedding_collection(json!([])).unwrap().is_empty());
    }

    #[test]
    fn parse_openai_data_shape() {
        let value = json!({ "data": [{ "embedding": [0.5, 0.25] }] });
        assert_eq!(
            parse_embeddings_from_value(value).unwrap(),
            vec![vec![0.5, 0.25]]
        );
    }

    #[test]
    fn parse_rejects_non_numeric_entries() {
        let err = parse_embeddings_from_value(json!({ "embedding": ["a"] })).unwrap_err();
        assert!(matches!(err, SemanticError::Inference(_)));
    }

    #[tokio::test]
    async fn embed_reads_vector_from_server() {
        let url = one_shot_server("200 OK", r#"{"embedding":[3.0,0.0,4.0]}"#, "/embed").await;
        let model = ApiModel::new(descriptor(), url)
            .unwrap()
            .with_normalize(true)
            .with_retry(RetryConfig::default().with_max_retries(0));
        let v = model.embed("tenant rights").await.unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[2] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embed_surfaces_client_errors_as_transport() {
        let url = one_shot_server("400 Bad Request", r#"{"error":"bad"}"#, "/embed").await;
        let model = ApiModel::new(descriptor(), url)
            .unwrap()
            .with_retry(RetryConfig::default().with_max_retries(0));
        let err = model.embed("x").await.unwrap_err();
        match err {
            SemanticError::Transport(msg) => assert!(msg.contains("400")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
