use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::model::EmbeddingModel;
use crate::{EmbedPurpose, ModelDescriptor, ModelRole, SelectedEmbedding, SemanticError};

/// Name reported for the zero-vector fallback.
pub const DEGRADED_MODEL_NAME: &str = "degraded-zero-vector";

/// When a rule applies to a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Text has fewer than this many characters.
    ShorterThan(usize),
    Always,
}

impl Applicability {
    fn matches(self, chars: usize) -> bool {
        match self {
            Applicability::ShorterThan(limit) => chars < limit,
            Applicability::Always => true,
        }
    }
}

/// One row of the selection table.
#[derive(Clone)]
pub struct SelectionRule {
    pub applicability: Applicability,
    pub model: Arc<dyn EmbeddingModel>,
}

impl std::fmt::Debug for SelectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionRule")
            .field("applicability", &self.applicability)
            .field("model", self.model.descriptor())
            .field("loaded", &self.model.is_loaded())
            .finish()
    }
}

/// Picks the model for each text from a fixed-priority rule table.
///
/// Rules are evaluated top to bottom; the first rule whose model is loaded
/// and whose predicate holds wins. With the default table that means the
/// domain model for short texts and the general model for everything else.
#[derive(Debug, Clone)]
pub struct EmbeddingSelector {
    rules: Vec<SelectionRule>,
    dimension: usize,
    allow_degraded_fallback: bool,
}

impl EmbeddingSelector {
    pub fn builder(dimension: usize) -> EmbeddingSelectorBuilder {
        EmbeddingSelectorBuilder {
            dimension,
            short_text_threshold: 512,
            allow_degraded_fallback: false,
            domain: None,
            general: None,
        }
    }

    /// Builds the models described by `cfg` and arranges them into the default table.
    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self, SemanticError> {
        cfg.validate()?;
        let mut builder = Self::builder(cfg.dimension)
            .short_text_threshold(cfg.short_text_threshold)
            .allow_degraded_fallback(cfg.allow_degraded_fallback);
        if let Some(spec) = &cfg.domain_model {
            builder = builder.domain_model(spec.build(ModelRole::Domain)?);
        }
        if let Some(spec) = &cfg.general_model {
            builder = builder.general_model(spec.build(ModelRole::General)?);
        }
        builder.build()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn rules(&self) -> &[SelectionRule] {
        &self.rules
    }

    /// Descriptors of every model in the table, loaded or not.
    pub fn descriptors(&self) -> Vec<ModelDescriptor> {
        self.rules
            .iter()
            .map(|rule| rule.model.descriptor().clone())
            .collect()
    }

    /// The rule that would serve `text`, if any.
    pub fn select(&self, text: &str) -> Option<&SelectionRule> {
        let chars = text.chars().count();
        self.rules
            .iter()
            .find(|rule| rule.model.is_loaded() && rule.applicability.matches(chars))
    }

    pub async fn select_and_embed(
        &self,
        text: &str,
        purpose: EmbedPurpose,
    ) -> Result<SelectedEmbedding, SemanticError> {
        let chars = text.chars().count();
        let Some(rule) = self.select(text) else {
            if self.allow_degraded_fallback {
                warn!(
                    %purpose,
                    chars,
                    dimension = self.dimension,
                    "semantic.degraded_fallback"
                );
                return Ok(SelectedEmbedding {
                    vector: vec![0.0; self.dimension],
                    model_name: DEGRADED_MODEL_NAME.to_string(),
                    purpose,
                    degraded: true,
                });
            }
            return Err(SemanticError::NoEmbeddingModelAvailable {
                purpose: purpose.to_string(),
                chars,
            });
        };

        self.embed_using(rule.model.as_ref(), text, purpose).await
    }

    /// The loaded model called `name`, if the table has one.
    pub fn model(&self, name: &str) -> Option<&Arc<dyn EmbeddingModel>> {
        self.rules
            .iter()
            .map(|rule| &rule.model)
            .find(|model| model.is_loaded() && model.descriptor().name == name)
    }

    /// Embeds `text` with the named model, bypassing the rule table.
    ///
    /// A query has to be scored against corpus vectors from the same model,
    /// so retrieval uses this to embed the query once per indexed model.
    pub async fn embed_with(
        &self,
        model_name: &str,
        text: &str,
        purpose: EmbedPurpose,
    ) -> Result<SelectedEmbedding, SemanticError> {
        let model = self
            .model(model_name)
            .ok_or_else(|| SemanticError::ModelUnavailable {
                model: model_name.to_string(),
            })?;
        self.embed_using(model.as_ref(), text, purpose).await
    }

    async fn embed_using(
        &self,
        model: &dyn EmbeddingModel,
        text: &str,
        purpose: EmbedPurpose,
    ) -> Result<SelectedEmbedding, SemanticError> {
        let descriptor = model.descriptor();
        let start = Instant::now();
        let vector = model.embed(text).await?;
        if vector.len() != self.dimension {
            return Err(SemanticError::DimensionMismatch {
                model: descriptor.name.clone(),
                expected: self.dimension,
                got: vector.len(),
            });
        }
        debug!(
            %purpose,
            model = %descriptor.name,
            chars = text.chars().count(),
            elapsed_micros = start.elapsed().as_micros() as u64,
            "semantic.embed"
        );

        Ok(SelectedEmbedding {
            vector,
            model_name: descriptor.name.clone(),
            purpose,
            degraded: false,
        })
    }
}

/// Assembles the default two-row table.
pub struct EmbeddingSelectorBuilder {
    dimension: usize,
    short_text_threshold: usize,
    allow_degraded_fallback: bool,
    domain: Option<Arc<dyn EmbeddingModel>>,
    general: Option<Arc<dyn EmbeddingModel>>,
}

impl EmbeddingSelectorBuilder {
    pub fn short_text_threshold(mut self, threshold: usize) -> Self {
        self.short_text_threshold = threshold;
        self
    }

    pub fn allow_degraded_fallback(mut self, allow: bool) -> Self {
        self.allow_degraded_fallback = allow;
        self
    }

    pub fn domain_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.domain = Some(model);
        self
    }

    pub fn general_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.general = Some(model);
        self
    }

    /// Fails with `DimensionMismatch` if a model disagrees with the index width.
    pub fn build(self) -> Result<EmbeddingSelector, SemanticError> {
        if self.dimension == 0 {
            return Err(SemanticError::InvalidConfig(
                "selector dimension must be greater than zero".into(),
            ));
        }
        let mut rules = Vec::with_capacity(2);
        if let Some(model) = self.domain {
            rules.push(SelectionRule {
                applicability: Applicability::ShorterThan(self.short_text_threshold),
                model,
            });
        }
        if let Some(model) = self.general {
            rules.push(SelectionRule {
                applicability: Applicability::Always,
                model,
            });
        }
        for rule in &rules {
            let d = rule.model.descriptor();
            if d.dimension != self.dimension {
                return Err(SemanticError::DimensionMismatch {
                    model: d.name.clone(),
                    expected: self.dimension,
                    got: d.dimension,
                });
            }
        }
        Ok(EmbeddingSelector {
            rules,
            dimension: self.dimension,
            allow_degraded_fallback: self.allow_degraded_fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingModel;
    use async_trait::async_trait;

    struct Unloaded(ModelDescriptor);

    #[async_trait]
    impl EmbeddingModel for Unloaded {
        fn descriptor(&self) -> &ModelDescriptor {
            &self.0
        }
        fn is_loaded(&self) -> bool {
            false
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SemanticError> {
            Err(SemanticError::Inference("not loaded".into()))
        }
    }

    struct WrongWidth(ModelDescriptor);

    #[async_trait]
    impl EmbeddingModel for WrongWidth {
        fn descriptor(&self) -> &ModelDescriptor {
            &self.0
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SemanticError> {
            Ok(vec![1.0; self.0.dimension + 1])
        }
    }

    fn domain() -> Arc<dyn EmbeddingModel> {
        Arc::new(HashingModel::new("legal", 16, ModelRole::Domain))
    }

    fn general() -> Arc<dyn EmbeddingModel> {
        Arc::new(HashingModel::new("general", 16, ModelRole::General))
    }

    #[tokio::test]
    async fn short_text_uses_domain_model() {
        let selector = EmbeddingSelector::builder(16)
            .short_text_threshold(10)
            .domain_model(domain())
            .general_model(general())
            .build()
            .unwrap();
        let out = selector
            .select_and_embed("short", EmbedPurpose::Query)
            .await
            .unwrap();
        assert_eq!(out.model_name, "legal");
        assert!(!out.degraded);
    }

    #[tokio::test]
    async fn threshold_is_exclusive_and_counts_chars() {
        let selector = EmbeddingSelector::builder(16)
            .short_text_threshold(5)
            .domain_model(domain())
            .general_model(general())
            .build()
            .unwrap();
        // Five characters, twelve bytes.
        let out = selector
            .select_and_embed("ééééé", EmbedPurpose::Document)
            .await
            .unwrap();
        assert_eq!(out.model_name, "general");
        let out = selector
            .select_and_embed("éééé", EmbedPurpose::Document)
            .await
            .unwrap();
        assert_eq!(out.model_name, "legal");
    }

    #[tokio::test]
    async fn long_text_uses_general_model() {
        let selector = EmbeddingSelector::builder(16)
            .domain_model(domain())
            .general_model(general())
            .build()
            .unwrap();
        let text = "x".repeat(600);
        let out = selector
            .select_and_embed(&text, EmbedPurpose::Document)
            .await
            .unwrap();
        assert_eq!(out.model_name, "general");
    }

    #[tokio::test]
    async fn unloaded_domain_model_is_skipped() {
        let selector = EmbeddingSelector::builder(16)
            .domain_model(Arc::new(Unloaded(ModelDescriptor::new(
                "legal",
                16,
                ModelRole::Domain,
            ))))
            .general_model(general())
            .build()
            .unwrap();
        let out = selector
            .select_and_embed("short", EmbedPurpose::Query)
            .await
            .unwrap();
        assert_eq!(out.model_name, "general");
    }

    #[tokio::test]
    async fn long_text_without_general_model_fails() {
        let selector = EmbeddingSelector::builder(16)
            .short_text_threshold(4)
            .domain_model(domain())
            .build()
            .unwrap();
        let err = selector
            .select_and_embed("longer than four", EmbedPurpose::Document)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SemanticError::NoEmbeddingModelAvailable { .. }
        ));
    }

    #[tokio::test]
    async fn empty_table_fails_without_fallback() {
        let selector = EmbeddingSelector::builder(8).build().unwrap();
        let err = selector
            .select_and_embed("anything", EmbedPurpose::Query)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SemanticError::NoEmbeddingModelAvailable {
                purpose: "query".into(),
                chars: 8
            }
        );
    }

    #[tokio::test]
    async fn degraded_fallback_is_flagged_zero_vector() {
        let selector = EmbeddingSelector::builder(8)
            .allow_degraded_fallback(true)
            .build()
            .unwrap();
        let out = selector
            .select_and_embed("anything", EmbedPurpose::Document)
            .await
            .unwrap();
        assert!(out.degraded);
        assert_eq!(out.model_name, DEGRADED_MODEL_NAME);
        assert_eq!(out.vector, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn selection_is_deterministic() {
        let selector = EmbeddingSelector::builder(16)
            .domain_model(domain())
            .general_model(general())
            .build()
            .unwrap();
        let a = selector
            .select_and_embed("lease termination", EmbedPurpose::Query)
            .await
            .unwrap();
        let b = selector
            .select_and_embed("lease termination", EmbedPurpose::Query)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mismatched_descriptor_rejected_at_build() {
        let err = EmbeddingSelector::builder(32)
            .general_model(general())
            .build()
            .unwrap_err();
        assert!(matches!(err, SemanticError::DimensionMismatch { expected: 32, got: 16, .. }));
    }

    #[tokio::test]
    async fn model_output_width_is_checked() {
        let selector = EmbeddingSelector::builder(4)
            .general_model(Arc::new(WrongWidth(ModelDescriptor::new(
                "liar",
                4,
                ModelRole::General,
            ))))
            .build()
            .unwrap();
        let err = selector
            .select_and_embed("text", EmbedPurpose::Query)
            .await
            .unwrap_err();
        assert!(matches!(err, SemanticError::DimensionMismatch { got: 5, .. }));
    }

    #[tokio::test]
    async fn embed_with_names_the_model() {
        let selector = EmbeddingSelector::builder(16)
            .domain_model(domain())
            .general_model(general())
            .build()
            .unwrap();
        // "short" would route to the domain model.
        let out = selector
            .embed_with("general", "short", EmbedPurpose::Query)
            .await
            .unwrap();
        assert_eq!(out.model_name, "general");
        let routed = selector
            .select_and_embed("short", EmbedPurpose::Query)
            .await
            .unwrap();
        assert_eq!(routed.model_name, "legal");
    }

    #[tokio::test]
    async fn embed_with_unknown_or_unloaded_model_fails() {
        let selector = EmbeddingSelector::builder(16)
            .domain_model(Arc::new(Unloaded(ModelDescriptor::new(
                "legal",
                16,
                ModelRole::Domain,
            ))))
            .general_model(general())
            .build()
            .unwrap();
        for name in ["legal", "missing"] {
            let err = selector
                .embed_with(name, "text", EmbedPurpose::Query)
                .await
                .unwrap_err();
            assert_eq!(err, SemanticError::ModelUnavailable { model: name.into() });
        }
        assert!(selector.model("general").is_some());
    }

    #[tokio::test]
    async fn selected_vector_is_the_model_output() {
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for normalize in [true, false] {
            let model = HashingModel::new("general", 16, ModelRole::General).with_normalize(normalize);
            let direct = model.embed("notice to quit").await.unwrap();
            let selector = EmbeddingSelector::builder(16)
                .general_model(Arc::new(model))
                .build()
                .unwrap();
            let out = selector
                .select_and_embed("notice to quit", EmbedPurpose::Query)
                .await
                .unwrap();
            assert_eq!(out.vector, direct);
            assert_eq!((norm(out.vector.as_slice()) - 1.0).abs() < 1e-5, normalize);
        }
    }

    #[test]
    fn from_config_builds_default_table() {
        let selector = EmbeddingSelector::from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(selector.rules().len(), 1);
        assert_eq!(selector.rules()[0].applicability, Applicability::Always);
        assert_eq!(selector.dimension(), 384);
    }
}
