use async_trait::async_trait;
use fxhash::hash64;

use crate::model::EmbeddingModel;
use crate::normalize::l2_normalize_in_place;
use crate::{ModelDescriptor, ModelRole, SemanticError};

/// Offline model that hashes character trigrams into a fixed number of buckets.
///
/// Words are lowercased and padded with a space on both sides before the
/// trigram window runs, so "evict" and "eviction" share most of their
/// features. Cheap, deterministic, and good enough for lexical overlap.
#[derive(Debug, Clone)]
pub struct HashingModel {
    descriptor: ModelDescriptor,
    normalize: bool,
}

impl HashingModel {
    pub fn new(name: impl Into<String>, dimension: usize, role: ModelRole) -> Self {
        Self {
            descriptor: ModelDescriptor::new(name, dimension, role),
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub(crate) fn embed_sync(&self, text: &str) -> Vec<f32> {
        let dim = self.descriptor.dimension;
        let mut v = vec![0f32; dim];
        if dim == 0 {
            return v;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars().flat_map(char::to_lowercase))
                .chain(std::iter::once(' '))
                .collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                let bucket = (hash64(gram.as_bytes()) % dim as u64) as usize;
                v[bucket] += 1.0;
            }
        }
        if self.normalize {
            l2_normalize_in_place(&mut v);
        }
        v
    }
}

#[async_trait]
impl EmbeddingModel for HashingModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[test]
    fn hashing_model_is_deterministic() {
        let model = HashingModel::new("hash", 384, ModelRole::General);
        assert_eq!(
            model.embed_sync("Tenant eviction notice"),
            model.embed_sync("Tenant eviction notice")
        );
    }

    #[test]
    fn hashing_model_has_declared_dimension() {
        let model = HashingModel::new("hash", 128, ModelRole::Domain);
        assert_eq!(model.embed_sync("anything at all").len(), 128);
        assert_eq!(model.descriptor().dimension, 128);
    }

    #[test]
    fn hashing_model_normalizes_by_default() {
        let model = HashingModel::new("hash", 256, ModelRole::General);
        let v = model.embed_sync("contract breach remedies");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn hashing_model_without_normalization_counts_grams() {
        let model = HashingModel::new("hash", 64, ModelRole::General).with_normalize(false);
        // " a " is the only trigram.
        let v = model.embed_sync("a");
        assert_eq!(v.iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn hashing_model_is_case_insensitive() {
        let model = HashingModel::new("hash", 384, ModelRole::General);
        assert_eq!(model.embed_sync("TENANT"), model.embed_sync("tenant"));
    }

    #[test]
    fn hashing_model_empty_text_is_zero() {
        let model = HashingModel::new("hash", 32, ModelRole::General);
        assert!(model.embed_sync("  ... ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let model = HashingModel::new("hash", 384, ModelRole::General);
        let doc = model.embed_sync("Tenant eviction notice requirements");
        let related = model.embed_sync("What is required to evict a tenant in California?");
        let unrelated = model.embed_sync("Patent filing fees for software inventions");
        assert!(cosine(&doc, &related) > cosine(&doc, &unrelated));
        assert!(cosine(&doc, &related) > 0.3);
    }

    #[tokio::test]
    async fn embed_matches_sync_path() {
        let model = HashingModel::new("hash", 64, ModelRole::General);
        let v = model.embed("labor law").await.unwrap();
        assert_eq!(v, model.embed_sync("labor law"));
    }
}
