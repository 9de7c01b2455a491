use serde_json::{Map, Value};
use tracing::warn;

use crate::types::{DEFAULT_DOMAIN, DEFAULT_JURISDICTION};
use crate::{IngestError, LanguagePolicy, RawDocument};

/// Validated fields of a [`RawDocument`], before embedding.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidDocument {
    pub content: String,
    pub metadata: Map<String, Value>,
    pub jurisdiction: String,
    pub domain: String,
    pub language: String,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
}

/// Checks content and fills in jurisdiction, domain and language defaults.
pub(crate) fn validate_document(
    raw: RawDocument,
    languages: &LanguagePolicy,
) -> Result<ValidDocument, IngestError> {
    validate_text_content(&raw.content)?;

    let requested = raw.language.clone();
    let language = languages.resolve(requested.as_deref());
    if let Some(tag) = requested.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if !tag.eq_ignore_ascii_case(&language) {
            warn!(requested = tag, fallback = %language, "ingest.language_fallback");
        }
    }

    Ok(ValidDocument {
        content: raw.content,
        metadata: raw.metadata,
        jurisdiction: sanitize_optional_string(raw.jurisdiction)
            .unwrap_or_else(|| DEFAULT_JURISDICTION.to_string()),
        domain: sanitize_optional_string(raw.domain)
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
        language,
        embedding: raw.embedding,
        embedding_model: sanitize_optional_string(raw.embedding_model),
    })
}

fn validate_text_content(text: &str) -> Result<(), IngestError> {
    if text.contains('\0') {
        return Err(IngestError::InvalidDocument(
            "content contains null bytes".into(),
        ));
    }
    if text.trim().is_empty() {
        return Err(IngestError::InvalidDocument("content is empty".into()));
    }

    let control_count = if text.is_ascii() {
        text.bytes()
            .filter(|&b| b < 32 && !matches!(b, b'\t' | b'\n' | b'\r'))
            .count()
    } else {
        text.chars()
            .filter(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
            .count()
    };
    if control_count > text.len() / 10 {
        return Err(IngestError::InvalidDocument(
            "content contains too many control characters".into(),
        ));
    }
    Ok(())
}

/// Strips control characters and trims; `None` when nothing is left.
pub(crate) fn sanitize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let filtered: String = raw.chars().filter(|c| !c.is_control()).collect();
        let trimmed = filtered.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
