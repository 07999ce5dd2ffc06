use async_trait::async_trait;

use crate::error::OutfitResult;
use crate::models::{SearchRequest, SearchResult};

/// Nearest-neighbour lookup over the embedded catalogue.
///
/// Scoring and ranking belong to the index; implementations only pick the
/// index, bound the query size and project the result fields.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Closest products first; an empty vector when nothing matches
    async fn search(&self, request: SearchRequest) -> OutfitResult<Vec<SearchResult>>;
}
