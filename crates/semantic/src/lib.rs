//! lexrag Semantic
//!
//! Turns text into vectors for the retrieval engine. The interesting part is
//! not the math (models are opaque here) but deciding *which* model gets to
//! embed a given text.
//!
//! Models plug in behind [`EmbeddingModel`]:
//!
//! - **Hashing** - offline character-trigram hashing. Deterministic, no assets.
//! - **API** - HTTP inference endpoint (HuggingFace, OpenAI-style or custom
//!   payloads) with retry and backoff.
//!
//! [`EmbeddingSelector`] holds a small rule table evaluated top to bottom:
//! domain model for short texts, general model otherwise. If nothing applies
//! you get `NoEmbeddingModelAvailable`, unless the zero-vector fallback is
//! switched on, in which case the result comes back flagged `degraded` and a
//! warning is logged. A zero vector is never a similarity signal.
//!
//! ## Quick example
//!
//! ```no_run
//! use semantic::{EmbedPurpose, EmbeddingConfig, EmbeddingSelector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), semantic::SemanticError> {
//!     let selector = EmbeddingSelector::from_config(&EmbeddingConfig::default())?;
//!     let out = selector
//!         .select_and_embed("notice period for eviction", EmbedPurpose::Query)
//!         .await?;
//!     println!("{} -> {} dims", out.model_name, out.vector.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

mod api;
mod hashing;
mod model;
mod normalize;
mod selector;
mod serde_millis;

#[cfg(any(test, feature = "test-helpers"))]
#[doc(hidden)]
pub mod test_helpers;

pub use crate::api::{ApiModel, ApiProvider};
pub use crate::config::{EmbeddingConfig, ModelKind, ModelSpec};
pub use crate::error::SemanticError;
pub use crate::hashing::HashingModel;
pub use crate::model::EmbeddingModel;
pub use crate::retry::RetryConfig;
pub use crate::selector::{
    Applicability, EmbeddingSelector, EmbeddingSelectorBuilder, SelectionRule,
    DEGRADED_MODEL_NAME,
};
pub use crate::types::{EmbedPurpose, ModelDescriptor, ModelRole, SelectedEmbedding};
