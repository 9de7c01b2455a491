//! Engine configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults (every section is `#[serde(default)]`, so a missing
//!    file is a valid configuration).
//! 2. A config file: `lexrag.{toml,yaml,json}` in the working directory, or
//!    an explicit path.
//! 3. Environment variables prefixed `LEXRAG__`, with `__` between path
//!    segments, e.g. `LEXRAG__RETRIEVAL__MAX_RETRIEVED_DOCS=3`.
//!
//! ## Example
//!
//! ```toml
//! [embedding]
//! dimension = 384
//! short_text_threshold = 512
//!
//! [embedding.general_model]
//! kind = "hashing"
//! name = "hashing-trigram-384"
//! dimension = 384
//!
//! [retrieval]
//! max_retrieved_docs = 5
//! min_relevance_score = 0.3
//!
//! [retrieval.chunking]
//! enabled = true
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [generator]
//! kind = "template"
//! ```

use std::collections::HashMap;
use std::path::Path;

use index::AnnConfig;
use ingest::{IngestConfig, LanguagePolicy};
use retrieval::RetrievalConfig;
use semantic::{EmbeddingConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "LEXRAG";
pub const DEFAULT_CONFIG_NAME: &str = "lexrag";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// `ingest.*` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestSection {
    pub concurrency: usize,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

/// `index.*` keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSection {
    pub ann: AnnConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Deterministic answers quoted from the top sources.
    #[default]
    Template,
    /// Remote completion endpoint.
    Http,
    /// No generator; answers are always extractive.
    None,
}

/// `generator.*` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    pub url: Option<String>,
    pub model: String,
    pub auth_header: Option<String>,
    pub max_tokens: u32,
    pub retry: RetryConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::Template,
            url: None,
            model: "legal-completion".to_string(),
            auth_header: None,
            max_tokens: 512,
            retry: RetryConfig::default(),
        }
    }
}

/// Top-level configuration for a [`RagEngine`](crate::RagEngine).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestSection,
    pub index: IndexSection,
    pub languages: LanguagePolicy,
    pub generator: GeneratorConfig,
}

impl EngineConfig {
    /// Loads defaults, then `path` (or `lexrag.*` if present), then `LEXRAG__*` env vars.
    ///
    /// An explicit `path` must exist; the implicit file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load) but reads environment overrides from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(env);

        let cfg: EngineConfig = config::Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses configuration text in the given format, without env overrides.
    pub fn parse(content: &str, format: config::FileFormat) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = config::Config::builder()
            .add_source(config::File::from_str(content, format))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.retrieval
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.ingest_config()
            .validate()
            .map_err(ConfigError::Validation)?;

        let ann = &self.index.ann;
        if ann.m == 0 || ann.ef_construction == 0 || ann.ef_search == 0 {
            return Err(ConfigError::Validation(
                "index.ann.m, ef_construction and ef_search must be greater than zero".into(),
            ));
        }

        if self.generator.kind == GeneratorKind::Http
            && self
                .generator
                .url
                .as_deref()
                .map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "generator.url is required when generator.kind = http".into(),
            ));
        }
        Ok(())
    }

    /// The ingest crate's view of this configuration.
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            concurrency: self.ingest.concurrency,
            chunking: self.retrieval.chunking.clone(),
            languages: self.languages.clone(),
        }
    }
}
