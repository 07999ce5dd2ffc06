//! MongoDB Atlas `$vectorSearch` implementation of [`SimilaritySearch`].

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Collection, Database};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use super::SimilaritySearch;
use crate::config::OutfitConfig;
use crate::error::{OutfitError, OutfitResult};
use crate::models::{EmbeddingModel, SearchRequest, SearchResult};

const SERVICE: &str = "vector search";

/// Upper bound on `limit`
pub const MAX_TOP_K: u32 = 100;
/// Atlas rejects `numCandidates` above this
pub const MAX_CANDIDATES: u32 = 10_000;

/// Which collection, index and field a search targets
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchSettings {
    pub collection: String,
    pub index: String,
    pub embedding_field: String,
    pub candidate_multiplier: u32,
}

impl From<&OutfitConfig> for VectorSearchSettings {
    fn from(config: &OutfitConfig) -> Self {
        Self {
            collection: config.products_collection.clone(),
            index: config.vector_index.clone(),
            embedding_field: config.embedding_field.clone(),
            candidate_multiplier: config.candidate_multiplier,
        }
    }
}

impl VectorSearchSettings {
    /// Clamp `top_k` into `1..=MAX_TOP_K` and derive the candidate pool
    pub fn bounds(&self, top_k: u32) -> (u32, u32) {
        let limit = top_k.clamp(1, MAX_TOP_K);
        let candidates = limit
            .saturating_mul(self.candidate_multiplier.max(1))
            .clamp(limit, MAX_CANDIDATES);
        (limit, candidates)
    }

    /// `$vectorSearch` followed by the result projection
    pub fn pipeline(&self, request: &SearchRequest) -> Vec<Document> {
        let (limit, candidates) = self.bounds(request.top_k);
        let query_vector: Vec<Bson> = request
            .vector
            .iter()
            .map(|v| Bson::Double(f64::from(*v)))
            .collect();

        let mut vector_search = doc! {
            "index": self.index.as_str(),
            "path": self.embedding_field.as_str(),
            "queryVector": query_vector,
            "numCandidates": i64::from(candidates),
            "limit": i64::from(limit),
        };
        if let Some(filter) = &request.filter {
            vector_search.insert("filter", doc! { filter.field.as_str(): { "$eq": filter.value.as_str() } });
        }

        vec![
            doc! { "$vectorSearch": vector_search },
            doc! {
                "$project": {
                    "_id": 0,
                    "id": { "$toString": "$_id" },
                    "name": 1,
                    "subcategory": 1,
                    "model_id": "$model",
                    "image": 1,
                    "price": "$raw_price",
                    "score": { "$meta": "vectorSearchScore" },
                }
            },
        ]
    }
}

/// Atlas Vector Search index over the embedding field.
///
/// Includes a `subcategory` filter field so equality filters can run inside
/// the index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndexDefinition {
    pub name: String,
    pub path: String,
    pub dimensions: u32,
    pub similarity: String,
    pub filter_fields: Vec<String>,
}

impl VectorIndexDefinition {
    pub fn new(settings: &VectorSearchSettings, model: EmbeddingModel) -> Self {
        Self {
            name: settings.index.clone(),
            path: settings.embedding_field.clone(),
            dimensions: model.dimension(),
            similarity: "cosine".to_string(),
            filter_fields: vec!["subcategory".to_string()],
        }
    }

    pub fn to_document(&self) -> Document {
        let mut fields = vec![Bson::Document(doc! {
            "type": "vector",
            "path": self.path.as_str(),
            "numDimensions": i64::from(self.dimensions),
            "similarity": self.similarity.as_str(),
        })];
        fields.extend(
            self.filter_fields
                .iter()
                .map(|path| Bson::Document(doc! { "type": "filter", "path": path.as_str() })),
        );

        doc! {
            "name": self.name.as_str(),
            "type": "vectorSearch",
            "definition": { "fields": fields },
        }
    }
}

/// Existence checks for the search target
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait IndexCatalog: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> OutfitResult<bool>;
    async fn index_exists(&self, collection: &str, index: &str) -> OutfitResult<bool>;
}

#[async_trait]
impl IndexCatalog for Database {
    async fn collection_exists(&self, collection: &str) -> OutfitResult<bool> {
        let names = self
            .list_collection_names()
            .filter(doc! { "name": collection })
            .await?;
        Ok(!names.is_empty())
    }

    async fn index_exists(&self, collection: &str, index: &str) -> OutfitResult<bool> {
        let indexes: Vec<Document> = self
            .collection::<Document>(collection)
            .aggregate(vec![doc! { "$listSearchIndexes": { "name": index } }])
            .await?
            .try_collect()
            .await?;
        Ok(!indexes.is_empty())
    }
}

/// Service error when the collection or its vector index is missing.
///
/// Atlas answers a query against either with an empty result, which would
/// be indistinguishable from "no matches".
async fn verify_target(
    catalog: &dyn IndexCatalog,
    settings: &VectorSearchSettings,
) -> OutfitResult<()> {
    if !catalog.collection_exists(&settings.collection).await? {
        return Err(OutfitError::service(
            SERVICE,
            format!("collection '{}' does not exist", settings.collection),
        ));
    }
    if !catalog
        .index_exists(&settings.collection, &settings.index)
        .await?
    {
        return Err(OutfitError::service(
            SERVICE,
            format!(
                "vector index '{}' not found on '{}'",
                settings.index, settings.collection
            ),
        ));
    }
    Ok(())
}

/// Runs [`verify_target`] until it first succeeds; failures are retried on
/// the next call
async fn verify_once(
    verified: &OnceCell<()>,
    catalog: &dyn IndexCatalog,
    settings: &VectorSearchSettings,
) -> OutfitResult<()> {
    verified
        .get_or_try_init(|| verify_target(catalog, settings))
        .await?;
    Ok(())
}

/// Searches one collection's vector index.
///
/// The collection and index are checked on the first search; until that
/// check passes every search fails with a service error.
pub struct AtlasVectorSearch {
    db: Database,
    collection: Collection<Document>,
    settings: VectorSearchSettings,
    verified: OnceCell<()>,
}

impl AtlasVectorSearch {
    pub fn new(db: &Database, settings: VectorSearchSettings) -> Self {
        Self {
            db: db.clone(),
            collection: db.collection::<Document>(&settings.collection),
            settings,
            verified: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &VectorSearchSettings {
        &self.settings
    }

    /// Fail with a service error when the collection or index is missing
    #[instrument(skip(self), fields(collection = %self.settings.collection, index = %self.settings.index))]
    pub async fn verify(&self) -> OutfitResult<()> {
        verify_target(&self.db, &self.settings).await
    }

    /// Create the vector index unless one with the same name exists.
    ///
    /// Returns `true` when a creation request was issued. Atlas builds the
    /// index asynchronously, so it may not be queryable right away.
    #[instrument(skip(self, definition), fields(index = %definition.name))]
    pub async fn ensure_index(&self, definition: &VectorIndexDefinition) -> OutfitResult<bool> {
        if !self.db.collection_exists(&self.settings.collection).await? {
            self.db.create_collection(&self.settings.collection).await?;
            info!(collection = %self.settings.collection, "Created collection");
        }
        if self
            .db
            .index_exists(&self.settings.collection, &self.settings.index)
            .await?
        {
            debug!("Vector index already present");
            return Ok(false);
        }

        self.db
            .run_command(doc! {
                "createSearchIndexes": self.settings.collection.as_str(),
                "indexes": [definition.to_document()],
            })
            .await?;

        info!(dimensions = definition.dimensions, "Vector index creation requested");
        Ok(true)
    }
}

#[async_trait]
impl SimilaritySearch for AtlasVectorSearch {
    #[instrument(skip(self, request), fields(top_k = request.top_k, index = %self.settings.index))]
    async fn search(&self, request: SearchRequest) -> OutfitResult<Vec<SearchResult>> {
        if request.vector.is_empty() {
            return Err(OutfitError::InvalidInput("query vector is empty".to_string()));
        }
        verify_once(&self.verified, &self.db, &self.settings).await?;

        let pipeline = self.settings.pipeline(&request);
        let documents: Vec<Document> = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(|e| OutfitError::service(SERVICE, e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| OutfitError::service(SERVICE, e.to_string()))?;

        debug!(results = documents.len(), "Vector search completed");
        Ok(documents.iter().map(SearchResult::from_document).collect())
    }
}
