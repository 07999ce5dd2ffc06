//! Outfit Domain
//!
//! Extracts the items of an outfit from a photo with a multimodal model and
//! recommends the closest catalogue products through MongoDB Atlas Vector
//! Search. The catalogue side is prepared by an embedding backfill.
//!
//! # Architecture
//!
//! ```text
//!  photo ──► VisionProvider ──► extraction::parse_products ──► ExtractedProducts
//!                                                                    │
//!                                                  (user edits in OutfitSession)
//!                                                                    │
//!            RecommendationService ◄─────────────────────────────────┘
//!              │  per entry, bounded concurrency
//!              ├──► EmbeddingProvider   "<category>: <description>" → vector
//!              └──► SimilaritySearch    $vectorSearch → SearchResult
//!
//!  BackfillJob: CatalogRepository ──► EmbeddingProvider ──► write, then mark processed
//! ```
//!
//! Every external call goes through a trait (`EmbeddingProvider`,
//! `VisionProvider`, `SimilaritySearch`, `CatalogRepository`) with an OpenAI
//! or MongoDB implementation.
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_outfit::{
//!     AtlasVectorSearch, OpenAIConfig, OpenAIEmbeddingProvider, OpenAIVisionProvider,
//!     OutfitConfig, OutfitFinder, RecommendationService, VectorSearchSettings, handlers,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(db: mongodb::Database) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OutfitConfig::new("sk-...");
//! let openai = OpenAIConfig::from(&config);
//!
//! let embedder = Arc::new(OpenAIEmbeddingProvider::new(openai.clone(), config.embedding_model)?);
//! let vision = Arc::new(OpenAIVisionProvider::new(openai, &config.vision_model, config.vision_max_tokens)?);
//! let search = Arc::new(AtlasVectorSearch::new(&db, VectorSearchSettings::from(&config)));
//!
//! let recommender = RecommendationService::from_config(&config, embedder, search);
//! let router = handlers::router(OutfitFinder::new(vision, recommender));
//! # Ok(())
//! # }
//! ```

pub mod backfill;
pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod finder;
pub mod handlers;
pub mod models;
pub mod openai;
pub mod recommend;
pub mod search;
pub mod vision;

pub use backfill::{BackfillJob, BackfillMode, BackfillOptions, BackfillReport};
pub use catalog::{CatalogRepository, MongoCatalogRepository};
pub use config::OutfitConfig;
pub use embedding::{EmbeddingProvider, OpenAIEmbeddingProvider};
pub use error::{OutfitError, OutfitResult};
pub use extraction::{ExtractionIssue, ParsedExtraction, parse_products};
pub use finder::{Extraction, OutfitFinder, OutfitSession};
pub use handlers::ApiDoc;
pub use models::{
    EmbeddingModel, EmbeddingResult, EqualityFilter, ExtractedProducts, Price, ProductDocument,
    ProductEntry, SearchRequest, SearchResult,
};
pub use openai::OpenAIConfig;
pub use recommend::{
    EntryFailure, RecommendOptions, Recommendation, RecommendationGroup, RecommendationService,
};
pub use search::{AtlasVectorSearch, SimilaritySearch, VectorIndexDefinition, VectorSearchSettings};
pub use vision::{OpenAIVisionProvider, VisionProvider};
