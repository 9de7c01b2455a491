use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{ApiModel, ApiProvider};
use crate::hashing::HashingModel;
use crate::model::EmbeddingModel;
use crate::retry::RetryConfig;
use crate::{ModelDescriptor, ModelRole, SemanticError};

/// Backend that serves a configured model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Offline character-trigram hashing model.
    #[default]
    Hashing,
    /// Remote HTTP inference endpoint.
    Api,
}

/// Declarative description of one embedding model slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSpec {
    #[serde(default)]
    pub kind: ModelKind,
    pub name: String,
    pub dimension: usize,
    /// Endpoint for `kind = api`.
    #[serde(default)]
    pub url: Option<String>,
    /// `huggingface`, `openai` or `custom`.
    #[serde(default)]
    pub provider: Option<String>,
    /// Full `Authorization` header value, e.g. `Bearer <token>`.
    #[serde(default)]
    pub auth_header: Option<String>,
    #[serde(default = "ModelSpec::default_normalize")]
    pub normalize: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ModelSpec {
    fn default_normalize() -> bool {
        true
    }

    pub fn hashing(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            kind: ModelKind::Hashing,
            name: name.into(),
            dimension,
            url: None,
            provider: None,
            auth_header: None,
            normalize: true,
            retry: RetryConfig::default(),
        }
    }

    /// Instantiates the model for the given selection slot.
    pub fn build(&self, role: ModelRole) -> Result<Arc<dyn EmbeddingModel>, SemanticError> {
        if self.name.trim().is_empty() {
            return Err(SemanticError::InvalidConfig(
                "model name must not be empty".into(),
            ));
        }
        if self.dimension == 0 {
            return Err(SemanticError::InvalidConfig(format!(
                "model '{}' must declare a non-zero dimension",
                self.name
            )));
        }
        match self.kind {
            ModelKind::Hashing => Ok(Arc::new(
                HashingModel::new(self.name.clone(), self.dimension, role)
                    .with_normalize(self.normalize),
            )),
            ModelKind::Api => {
                let url = self.url.clone().ok_or_else(|| {
                    SemanticError::InvalidConfig(format!(
                        "model '{}' has kind = api but no url",
                        self.name
                    ))
                })?;
                let descriptor = ModelDescriptor::new(self.name.clone(), self.dimension, role);
                let model = ApiModel::new(descriptor, url)?
                    .with_provider(
                        self.provider
                            .as_deref()
                            .map(ApiProvider::parse)
                            .unwrap_or_default(),
                    )
                    .with_auth_header(self.auth_header.clone())
                    .with_normalize(self.normalize)
                    .with_retry(self.retry);
                Ok(Arc::new(model))
            }
        }
    }
}

/// Embedding settings (`embedding.*` keys).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Texts shorter than this many characters prefer the domain model.
    pub short_text_threshold: usize,
    /// Width shared by every vector in the index.
    pub dimension: usize,
    /// Return a flagged zero vector instead of failing when no model is loaded.
    pub allow_degraded_fallback: bool,
    pub domain_model: Option<ModelSpec>,
    pub general_model: Option<ModelSpec>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            short_text_threshold: 512,
            dimension: 384,
            allow_degraded_fallback: false,
            domain_model: None,
            general_model: Some(ModelSpec::hashing("hashing-trigram-384", 384)),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), SemanticError> {
        if self.dimension == 0 {
            return Err(SemanticError::InvalidConfig(
                "embedding.dimension must be greater than zero".into(),
            ));
        }
        for spec in self.domain_model.iter().chain(self.general_model.iter()) {
            if spec.dimension != self.dimension {
                return Err(SemanticError::DimensionMismatch {
                    model: spec.name.clone(),
                    expected: self.dimension,
                    got: spec.dimension,
                });
            }
        }
        Ok(())
    }
}
