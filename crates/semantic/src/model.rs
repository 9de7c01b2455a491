use async_trait::async_trait;

use crate::{ModelDescriptor, SemanticError};

/// A handle to something that turns text into a fixed-width vector.
///
/// Implementations must be deterministic for a given input: the selector and
/// the index both assume the same text always lands on the same vector.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn descriptor(&self) -> &ModelDescriptor;

    /// Whether the model can serve requests right now. Unloaded models are
    /// skipped by the selector instead of being called.
    fn is_loaded(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError>;
}
