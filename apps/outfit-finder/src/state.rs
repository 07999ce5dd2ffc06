//! Shared application state and wiring of the outfit pipeline.
//!
//! The state is cheap to clone: the MongoDB handles share one connection
//! pool and the providers are built on demand from the configuration.

use domain_outfit::{
    AtlasVectorSearch, EmbeddingProvider, MongoCatalogRepository, OpenAIConfig,
    OpenAIEmbeddingProvider, OpenAIVisionProvider, OutfitFinder, OutfitResult,
    RecommendationService, VectorSearchSettings,
};
use mongodb::{Client, Database};
use std::sync::Arc;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Kept so shutdown can release the pool explicitly
    pub mongo_client: Client,
    pub db: Database,
}

impl AppState {
    fn openai(&self) -> OpenAIConfig {
        OpenAIConfig::from(&self.config.outfit)
    }

    pub fn embedder(&self) -> OutfitResult<Arc<dyn EmbeddingProvider>> {
        let provider = OpenAIEmbeddingProvider::new(self.openai(), self.config.outfit.embedding_model)?;
        Ok(Arc::new(provider))
    }

    pub fn vector_search(&self) -> AtlasVectorSearch {
        AtlasVectorSearch::new(&self.db, VectorSearchSettings::from(&self.config.outfit))
    }

    pub fn catalog(&self, collection: &str) -> MongoCatalogRepository {
        MongoCatalogRepository::new(&self.db, collection)
    }

    pub fn recommender(&self) -> OutfitResult<RecommendationService> {
        Ok(RecommendationService::from_config(
            &self.config.outfit,
            self.embedder()?,
            Arc::new(self.vector_search()),
        ))
    }

    pub fn finder(&self) -> OutfitResult<OutfitFinder> {
        let outfit = &self.config.outfit;
        let vision = OpenAIVisionProvider::new(
            self.openai(),
            outfit.vision_model.clone(),
            outfit.vision_max_tokens,
        )?;
        Ok(OutfitFinder::new(Arc::new(vision), self.recommender()?))
    }
}
