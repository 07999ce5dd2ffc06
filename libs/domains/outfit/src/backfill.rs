//! Embedding backfill over the product catalogue.
//!
//! Each unprocessed document is embedded from a selection of its text
//! fields and written back either in place or as a copy in another
//! collection. The source `processed` marker is only ever set after the
//! embedding has been stored, so an interrupted run resumes where it stopped
//! and a copy is never duplicated (copies are upserted by `_id`).

use futures::StreamExt;
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::catalog::CatalogRepository;
use crate::config::{DEFAULT_BACKFILL_FIELDS, OutfitConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{OutfitError, OutfitResult};
use crate::models::{PROCESSED_FIELD, ProductDocument};

/// Where embeddings are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillMode {
    /// Add the embedding to the source document itself
    InPlace,
    /// Copy the document, with its embedding, into `destination`
    Copy { destination: String },
}

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub mode: BackfillMode,
    pub text_fields: Vec<String>,
    pub embedding_field: String,
    pub limit: Option<u64>,
    pub concurrency: usize,
}

impl BackfillOptions {
    pub fn new(mode: BackfillMode, embedding_field: impl Into<String>) -> Self {
        Self {
            mode,
            text_fields: DEFAULT_BACKFILL_FIELDS.iter().map(|s| s.to_string()).collect(),
            embedding_field: embedding_field.into(),
            limit: None,
            concurrency: 1,
        }
    }

    /// In-place defaults taken from the pipeline configuration
    pub fn from_config(config: &OutfitConfig) -> Self {
        Self {
            text_fields: config.backfill_fields.clone(),
            ..Self::new(BackfillMode::InPlace, config.embedding_field.clone())
        }
    }

    pub fn with_mode(mut self, mode: BackfillMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Counters for one backfill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BackfillReport {
    /// Unprocessed documents read from the source
    pub scanned: u64,
    pub embedded: u64,
    /// Documents with no text in the selected fields, or already processed.
    /// Blank documents are left unmarked so they are picked up once their
    /// text is filled in, and are counted again on every run until then.
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Embedded,
    Skipped,
    Failed,
}

impl BackfillReport {
    fn record(&mut self, outcome: Outcome) {
        self.scanned += 1;
        match outcome {
            Outcome::Embedded => self.embedded += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

pub struct BackfillJob {
    catalog: Arc<dyn CatalogRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl BackfillJob {
    pub fn new(catalog: Arc<dyn CatalogRepository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { catalog, embedder }
    }

    /// Process every unprocessed document (up to `options.limit`).
    ///
    /// Only a failure to open the source cursor aborts the run; per-document
    /// errors are logged and counted.
    #[instrument(skip(self, options), fields(mode = ?options.mode, concurrency = options.concurrency))]
    pub async fn run(&self, options: &BackfillOptions) -> OutfitResult<BackfillReport> {
        if options.text_fields.is_empty() {
            return Err(OutfitError::InvalidInput(
                "at least one text field is required".to_string(),
            ));
        }
        if let BackfillMode::Copy { destination } = &options.mode {
            if destination.trim().is_empty() {
                return Err(OutfitError::InvalidInput(
                    "destination collection name is empty".to_string(),
                ));
            }
        }

        info!(fields = ?options.text_fields, limit = ?options.limit, "Starting embedding backfill");

        let documents = self.catalog.unprocessed(options.limit).await?;
        let report = documents
            .map(|document| async move {
                match document {
                    Ok(document) => self.process(document, options).await,
                    Err(e) => {
                        warn!(error = %e, "Failed to read source document");
                        Outcome::Failed
                    }
                }
            })
            .buffer_unordered(options.concurrency.max(1))
            .fold(BackfillReport::default(), |mut report, outcome| async move {
                report.record(outcome);
                report
            })
            .await;

        info!(
            scanned = report.scanned,
            embedded = report.embedded,
            skipped = report.skipped,
            failed = report.failed,
            "Embedding backfill finished"
        );
        Ok(report)
    }

    async fn process(&self, document: ProductDocument, options: &BackfillOptions) -> Outcome {
        let document_id = document.id_string();

        // Never re-embed
        if document.is_processed() {
            return Outcome::Skipped;
        }

        let text = document.embedding_text(&options.text_fields);
        // Left unmarked: a later run embeds it once text is added
        if text.is_empty() {
            debug!(document_id = %document_id, "No text to embed, skipping");
            return Outcome::Skipped;
        }

        match self.embed_and_store(document, &text, options).await {
            Ok(true) => {
                debug!(document_id = %document_id, "Document embedded");
                Outcome::Embedded
            }
            Ok(false) => Outcome::Skipped,
            Err(e) => {
                warn!(
                    document_id = %document_id,
                    error_kind = e.kind(),
                    error = %e,
                    "Failed to embed document, skipping"
                );
                Outcome::Failed
            }
        }
    }

    /// `Ok(false)` when another writer processed the document first
    async fn embed_and_store(
        &self,
        document: ProductDocument,
        text: &str,
        options: &BackfillOptions,
    ) -> OutfitResult<bool> {
        let id = document
            .id()
            .cloned()
            .ok_or_else(|| OutfitError::InvalidInput("document has no _id".to_string()))?;

        let embedding = self.embedder.embed(text).await?;

        match &options.mode {
            BackfillMode::InPlace => {
                self.catalog
                    .store_in_place(&id, &options.embedding_field, &embedding.values)
                    .await
            }
            BackfillMode::Copy { destination } => {
                let copy = copy_with_embedding(
                    document.into_document(),
                    &options.embedding_field,
                    &embedding.values,
                );
                self.catalog.upsert_copy(destination, copy).await?;
                self.catalog.mark_processed(&id).await?;
                Ok(true)
            }
        }
    }
}

/// Destination copy: source fields plus the embedding, without the marker
fn copy_with_embedding(mut document: Document, field: &str, embedding: &[f32]) -> Document {
    document.remove(PROCESSED_FIELD);
    document.insert(
        field,
        Bson::Array(embedding.iter().map(|v| Bson::Double(f64::from(*v))).collect()),
    );
    document
}
