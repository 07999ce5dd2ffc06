use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info_span, instrument, warn};
use utoipa::ToSchema;

use crate::config::OutfitConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{OutfitError, OutfitResult};
use crate::models::{EqualityFilter, ExtractedProducts, ProductEntry, SearchRequest, SearchResult};
use crate::search::SimilaritySearch;

/// Matches for one extracted product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecommendationGroup {
    pub category: String,
    pub description: String,
    /// Text that was embedded for the lookup
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// A product whose lookup failed; other products are unaffected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EntryFailure {
    pub category: String,
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recommendation {
    /// Successful lookups, in input order
    pub groups: Vec<RecommendationGroup>,
    pub failures: Vec<EntryFailure>,
}

impl Recommendation {
    /// Every result, grouped by input order
    pub fn results(&self) -> Vec<SearchResult> {
        self.groups
            .iter()
            .flat_map(|group| group.results.iter().cloned())
            .collect()
    }

    pub fn total_results(&self) -> usize {
        self.groups.iter().map(|group| group.results.len()).sum()
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendOptions {
    pub top_k: Option<u32>,
    pub filter: Option<EqualityFilter>,
}

/// Embeds each extracted product and looks up its nearest catalogue items.
///
/// Entries run as concurrent tasks bounded by `max_concurrency`. Dropping
/// the returned future aborts the in-flight lookups.
#[derive(Clone)]
pub struct RecommendationService {
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn SimilaritySearch>,
    default_top_k: u32,
    max_concurrency: usize,
}

impl RecommendationService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, search: Arc<dyn SimilaritySearch>) -> Self {
        Self {
            embedder,
            search,
            default_top_k: 1,
            max_concurrency: 4,
        }
    }

    pub fn from_config(
        config: &OutfitConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn SimilaritySearch>,
    ) -> Self {
        Self::new(embedder, search)
            .with_default_top_k(config.default_top_k)
            .with_max_concurrency(config.max_concurrency)
    }

    pub fn with_default_top_k(mut self, top_k: u32) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn default_top_k(&self) -> u32 {
        self.default_top_k
    }

    /// Look up every entry. Never fails as a whole: an empty mapping gives an
    /// empty recommendation and per-entry errors land in `failures`.
    #[instrument(skip(self, products, options), fields(entries = products.len()))]
    pub async fn recommend(
        &self,
        products: &ExtractedProducts,
        options: RecommendOptions,
    ) -> Recommendation {
        if products.is_empty() {
            debug!("No products to recommend for");
            return Recommendation::default();
        }

        let top_k = options.top_k.unwrap_or(self.default_top_k).max(1);
        let entries: Vec<ProductEntry> = products.iter().cloned().collect();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (index, entry) in entries.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let embedder = Arc::clone(&self.embedder);
            let search = Arc::clone(&self.search);
            let filter = options.filter.clone();
            let span = info_span!("recommend_entry", category = %entry.category);

            join_set.spawn(
                async move {
                    let result = match semaphore.acquire().await {
                        Ok(_permit) => {
                            lookup(embedder.as_ref(), search.as_ref(), &entry, top_k, filter).await
                        }
                        Err(_) => Err(OutfitError::Internal("concurrency limiter closed".to_string())),
                    };
                    (index, result)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<OutfitResult<Vec<SearchResult>>>> =
            (0..entries.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "Recommendation task did not complete"),
            }
        }

        let mut recommendation = Recommendation::default();
        for (entry, slot) in entries.into_iter().zip(slots) {
            let result = slot.unwrap_or_else(|| {
                Err(OutfitError::Internal("lookup task aborted".to_string()))
            });
            match result {
                Ok(results) => recommendation.groups.push(RecommendationGroup {
                    query: entry.query_text(),
                    category: entry.category,
                    description: entry.description,
                    results,
                }),
                Err(e) => {
                    warn!(
                        category = %entry.category,
                        error_kind = e.kind(),
                        error = %e,
                        "Recommendation failed for entry"
                    );
                    recommendation.failures.push(EntryFailure {
                        category: entry.category,
                        error: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        recommendation
    }
}

async fn lookup(
    embedder: &dyn EmbeddingProvider,
    search: &dyn SimilaritySearch,
    entry: &ProductEntry,
    top_k: u32,
    filter: Option<EqualityFilter>,
) -> OutfitResult<Vec<SearchResult>> {
    if entry.description.trim().is_empty() {
        return Err(OutfitError::InvalidInput(format!(
            "description for '{}' is empty",
            entry.category
        )));
    }

    let embedding = embedder.embed(&entry.query_text()).await?;
    let mut request = SearchRequest::new(embedding.values, top_k);
    if let Some(filter) = filter {
        request = request.with_filter(filter);
    }
    search.search(request).await
}
