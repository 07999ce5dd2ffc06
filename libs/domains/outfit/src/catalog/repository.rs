use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::{Bson, Document};

use crate::error::OutfitResult;
use crate::models::ProductDocument;

pub type ProductStream = BoxStream<'static, OutfitResult<ProductDocument>>;

/// Storage operations used by the embedding backfill
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Source documents not yet marked processed, at most `limit` of them
    async fn unprocessed(&self, limit: Option<u64>) -> OutfitResult<ProductStream>;

    /// Set the embedding and the processed marker in one update.
    ///
    /// Returns `false` when the document was already processed.
    async fn store_in_place(&self, id: &Bson, field: &str, embedding: &[f32]) -> OutfitResult<bool>;

    /// Insert or replace `document` in `destination`, keyed by its `_id`
    async fn upsert_copy(&self, destination: &str, document: Document) -> OutfitResult<()>;

    async fn mark_processed(&self, id: &Bson) -> OutfitResult<()>;
}
