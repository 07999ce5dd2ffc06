//! MongoDB implementation of CatalogRepository

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Collection, Database};
use tracing::instrument;

use super::repository::{CatalogRepository, ProductStream};
use crate::error::{OutfitError, OutfitResult};
use crate::models::{PROCESSED_FIELD, ProductDocument};

/// Documents fetched per query while scanning for unprocessed documents
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Catalogue collection access.
///
/// Unprocessed documents are read in `_id` order, one short query per page,
/// so no server cursor stays open while a page is being embedded.
pub struct MongoCatalogRepository {
    db: Database,
    source: Collection<Document>,
    page_size: u64,
}

impl MongoCatalogRepository {
    pub fn new(db: &Database, source_collection: &str) -> Self {
        Self {
            db: db.clone(),
            source: db.collection::<Document>(source_collection),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn unprocessed_filter() -> Document {
        doc! { PROCESSED_FIELD: { "$ne": true } }
    }

    /// Unprocessed documents after `after` in `_id` order
    fn page_filter(after: Option<&Bson>) -> Document {
        let mut filter = Self::unprocessed_filter();
        if let Some(after) = after {
            filter.insert("_id", doc! { "$gt": after.clone() });
        }
        filter
    }
}

/// Position of a paged scan
#[derive(Debug, Clone, PartialEq)]
struct Paging {
    after: Option<Bson>,
    remaining: Option<u64>,
    exhausted: bool,
}

impl Paging {
    fn start(limit: Option<u64>) -> Self {
        Self {
            after: None,
            remaining: limit,
            exhausted: false,
        }
    }

    /// Documents to request next; `None` when the scan is over
    fn next_size(&self, page_size: u64) -> Option<u64> {
        if self.exhausted {
            return None;
        }
        match self.remaining {
            Some(0) => None,
            Some(remaining) => Some(remaining.min(page_size)),
            None => Some(page_size),
        }
    }

    /// State after a page of `fetched` documents out of `requested`
    fn advance(self, last_id: Option<Bson>, fetched: u64, requested: u64) -> Self {
        Self {
            exhausted: fetched < requested || last_id.is_none(),
            after: last_id,
            remaining: self.remaining.map(|r| r.saturating_sub(fetched)),
        }
    }
}

async fn fetch_page(
    source: &Collection<Document>,
    page_size: u64,
    paging: Paging,
) -> OutfitResult<Option<(Vec<ProductDocument>, Paging)>> {
    let Some(requested) = paging.next_size(page_size) else {
        return Ok(None);
    };

    let documents: Vec<Document> = source
        .find(MongoCatalogRepository::page_filter(paging.after.as_ref()))
        .sort(doc! { "_id": 1 })
        .limit(i64::try_from(requested).unwrap_or(i64::MAX))
        .await?
        .try_collect()
        .await?;
    if documents.is_empty() {
        return Ok(None);
    }

    let last_id = documents.last().and_then(|d| d.get("_id")).cloned();
    let next = paging.advance(last_id, documents.len() as u64, requested);
    Ok(Some((
        documents.into_iter().map(ProductDocument::new).collect(),
        next,
    )))
}

fn embedding_bson(embedding: &[f32]) -> Bson {
    Bson::Array(embedding.iter().map(|v| Bson::Double(f64::from(*v))).collect())
}

#[async_trait]
impl CatalogRepository for MongoCatalogRepository {
    #[instrument(skip(self), fields(collection = %self.source.name(), page_size = self.page_size))]
    async fn unprocessed(&self, limit: Option<u64>) -> OutfitResult<ProductStream> {
        let source = self.source.clone();
        let page_size = self.page_size;

        let pages = stream::try_unfold(Paging::start(limit), move |paging| {
            let source = source.clone();
            async move { fetch_page(&source, page_size, paging).await }
        });
        Ok(pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, OutfitError>)))
            .try_flatten()
            .boxed())
    }

    #[instrument(skip(self, embedding), fields(dimension = embedding.len()))]
    async fn store_in_place(&self, id: &Bson, field: &str, embedding: &[f32]) -> OutfitResult<bool> {
        let mut filter = Self::unprocessed_filter();
        filter.insert("_id", id.clone());

        let result = self
            .source
            .update_one(
                filter,
                doc! { "$set": { field: embedding_bson(embedding), PROCESSED_FIELD: true } },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    #[instrument(skip(self, document))]
    async fn upsert_copy(&self, destination: &str, document: Document) -> OutfitResult<()> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| OutfitError::InvalidInput("document has no _id".to_string()))?;

        self.db
            .collection::<Document>(destination)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_processed(&self, id: &Bson) -> OutfitResult<()> {
        self.source
            .update_one(doc! { "_id": id.clone() }, doc! { "$set": { PROCESSED_FIELD: true } })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprocessed_filter_matches_missing_and_false() {
        assert_eq!(
            MongoCatalogRepository::unprocessed_filter(),
            doc! { "processed": { "$ne": true } }
        );
    }

    #[test]
    fn test_page_filter_resumes_after_last_id() {
        assert_eq!(
            MongoCatalogRepository::page_filter(None),
            doc! { "processed": { "$ne": true } }
        );
        assert_eq!(
            MongoCatalogRepository::page_filter(Some(&Bson::String("sku-7".to_string()))),
            doc! { "processed": { "$ne": true }, "_id": { "$gt": "sku-7" } }
        );
    }

    #[test]
    fn test_paging_without_limit_stops_on_short_page() {
        let paging = Paging::start(None);
        assert_eq!(paging.next_size(100), Some(100));

        let paging = paging.advance(Some(Bson::Int32(100)), 100, 100);
        assert_eq!(paging.after, Some(Bson::Int32(100)));
        assert_eq!(paging.next_size(100), Some(100));

        let paging = paging.advance(Some(Bson::Int32(142)), 42, 100);
        assert_eq!(paging.next_size(100), None);
    }

    #[test]
    fn test_paging_honours_limit_across_pages() {
        let paging = Paging::start(Some(250));
        assert_eq!(paging.next_size(100), Some(100));
        let paging = paging.advance(Some(Bson::Int32(1)), 100, 100);
        let paging = paging.advance(Some(Bson::Int32(2)), 100, 100);
        assert_eq!(paging.remaining, Some(50));
        assert_eq!(paging.next_size(100), Some(50));
        let paging = paging.advance(Some(Bson::Int32(3)), 50, 50);
        assert_eq!(paging.next_size(100), None);
    }

    #[test]
    fn test_embedding_bson_widens_to_double() {
        let bson = embedding_bson(&[0.5, -1.0]);
        assert_eq!(bson, Bson::Array(vec![Bson::Double(0.5), Bson::Double(-1.0)]));
    }
}
