use async_trait::async_trait;

use crate::error::OutfitResult;
use crate::models::{EmbeddingModel, EmbeddingResult};

/// Turns text into a vector comparable with the stored product embeddings.
///
/// The same implementation (and model) must serve both the catalogue
/// backfill and query time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model whose vector space this provider produces
    fn model(&self) -> EmbeddingModel;

    /// Embed a single non-blank text
    async fn embed(&self, text: &str) -> OutfitResult<EmbeddingResult>;
}
