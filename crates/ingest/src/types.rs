use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_JURISDICTION: &str = "federal";
pub const DEFAULT_DOMAIN: &str = "general";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Opaque identifier handed out by the [`DocumentStore`](crate::DocumentStore).
///
/// Ids increase with insertion but callers should treat them as keys only;
/// the store does not promise that `id - 1` is a storage position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{:06}", self.0)
    }
}

/// A document as supplied by a loader or caller, before validation.
///
/// Field names follow the corpus JSON files; `legal_domain` is accepted as an
/// alias for `domain`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawDocument {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default, alias = "legal_domain")]
    pub domain: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Precomputed vector. When absent the ingestor embeds `content`.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Model that produced `embedding`. When absent the vector is attributed
    /// to the model the selector would pick for `content`.
    #[serde(default)]
    pub embedding_model: Option<String>,
}

impl RawDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = Some(vector);
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }
}

/// Vector attached to a stored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model_name: String,
    /// Zero-vector fallback; never indexed.
    pub degraded: bool,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Name recorded for caller-supplied vectors no configured model can claim.
/// Such vectors are stored but never indexed.
pub const PRECOMPUTED_MODEL_NAME: &str = "precomputed";

/// A validated, stored document. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub jurisdiction: String,
    pub domain: String,
    pub language: String,
    pub embedding: Option<Embedding>,
    pub ingested_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Whether this record belongs in an index of width `dimension`.
    pub fn is_indexable(&self, dimension: usize) -> bool {
        self.embedding
            .as_ref()
            .is_some_and(|e| !e.degraded && e.dimension() == dimension)
    }

    /// First `max_chars` characters of the content, cut at a char boundary.
    pub fn excerpt(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((byte, _)) => format!("{}...", self.content[..byte].trim_end()),
            None => self.content.clone(),
        }
    }
}

/// Supported language tags and the fallback for everything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguagePolicy {
    pub supported: Vec<String>,
    pub default: String,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self {
            supported: [
                "en", "es", "fr", "de", "zh", "ar", "hi", "ja", "ko", "pt", "it", "ru", "tr",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl LanguagePolicy {
    pub fn is_supported(&self, tag: &str) -> bool {
        self.supported.iter().any(|s| s.eq_ignore_ascii_case(tag))
    }

    /// Lowercased `tag` when supported, otherwise the default.
    pub fn resolve(&self, tag: Option<&str>) -> String {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) if self.is_supported(t) => t.to_ascii_lowercase(),
            _ => self.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_display_is_padded() {
        assert_eq!(DocumentId::new(42).to_string(), "doc-000042");
    }

    #[test]
    fn document_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&DocumentId::new(7)).unwrap(), "7");
    }

    #[test]
    fn raw_document_accepts_legal_domain_alias() {
        let raw: RawDocument = serde_json::from_str(
            r#"{"content":"x","legal_domain":"housing","jurisdiction":"CA"}"#,
        )
        .unwrap();
        assert_eq!(raw.domain.as_deref(), Some("housing"));
        assert_eq!(raw.jurisdiction.as_deref(), Some("CA"));
        assert!(raw.language.is_none());
    }

    #[test]
    fn raw_document_builder() {
        let raw = RawDocument::new("body")
            .with_jurisdiction("NY")
            .with_domain("labor")
            .with_metadata("citation", "29 U.S.C. 201");
        assert_eq!(raw.metadata["citation"], "29 U.S.C. 201");
        assert_eq!(raw.domain.as_deref(), Some("labor"));
    }

    fn record(embedding: Option<Embedding>) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId::new(1),
            content: "Notice must be given thirty days in advance.".into(),
            metadata: Map::new(),
            jurisdiction: DEFAULT_JURISDICTION.into(),
            domain: DEFAULT_DOMAIN.into(),
            language: DEFAULT_LANGUAGE.into(),
            embedding,
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn indexable_requires_matching_non_degraded_embedding() {
        let good = Embedding {
            vector: vec![1.0; 4],
            model_name: "m".into(),
            degraded: false,
        };
        assert!(record(Some(good.clone())).is_indexable(4));
        assert!(!record(Some(good.clone())).is_indexable(8));
        assert!(!record(None).is_indexable(4));
        let degraded = Embedding {
            degraded: true,
            ..good
        };
        assert!(!record(Some(degraded)).is_indexable(4));
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        let r = record(None);
        assert_eq!(r.excerpt(6), "Notice...");
        assert_eq!(r.excerpt(1000), r.content);
    }

    #[test]
    fn language_policy_resolves_unsupported_to_default() {
        let policy = LanguagePolicy::default();
        assert_eq!(policy.resolve(Some("ES")), "es");
        assert_eq!(policy.resolve(Some("xx")), "en");
        assert_eq!(policy.resolve(None), "en");
        assert_eq!(policy.resolve(Some("  ")), "en");
        assert_eq!(policy.supported.len(), 13);
    }
}
