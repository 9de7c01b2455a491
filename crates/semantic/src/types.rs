use serde::{Deserialize, Serialize};
use std::fmt;

/// Which slot of the selection table a model fills.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Domain-tuned model, preferred for short texts.
    Domain,
    /// General-purpose model, used for everything else.
    General,
}

/// Why a text is being embedded. Recorded in logs and metadata only; the
/// selection policy is the same for both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EmbedPurpose {
    Document,
    Query,
}

impl fmt::Display for EmbedPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedPurpose::Document => f.write_str("document"),
            EmbedPurpose::Query => f.write_str("query"),
        }
    }
}

/// Static facts about an embedding model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Name reported in processing metadata.
    pub name: String,
    /// Width of every vector the model produces.
    pub dimension: usize,
    /// Slot in the selection table.
    pub role: ModelRole,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, dimension: usize, role: ModelRole) -> Self {
        Self {
            name: name.into(),
            dimension,
            role,
        }
    }
}

/// Output of [`EmbeddingSelector::select_and_embed`](crate::EmbeddingSelector::select_and_embed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedEmbedding {
    /// The model's output, passed through unchanged. Models normalize by
    /// default (`ModelSpec::normalize`); the vector index normalizes again,
    /// which leaves a unit vector as it is.
    pub vector: Vec<f32>,
    /// Name of the model that produced `vector`.
    pub model_name: String,
    pub purpose: EmbedPurpose,
    /// Set when `vector` is the zero-vector fallback and carries no similarity signal.
    pub degraded: bool,
}

impl SelectedEmbedding {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
