use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{OutfitError, OutfitResult};
use crate::extraction::{ExtractionIssue, parse_products};
use crate::models::ExtractedProducts;
use crate::recommend::{RecommendOptions, Recommendation, RecommendationService};
use crate::vision::{DEFAULT_INSTRUCTION, VisionProvider};

/// State of one user interaction: the uploaded photo, the instruction and
/// the (editable) products extracted from it.
///
/// Owned by the caller and passed through each step; nothing is kept
/// between sessions.
#[derive(Debug, Clone)]
pub struct OutfitSession {
    image: Option<Vec<u8>>,
    pub instruction: String,
    pub products: ExtractedProducts,
    raw_text: Option<String>,
    issue: Option<ExtractionIssue>,
}

impl Default for OutfitSession {
    fn default() -> Self {
        Self {
            image: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            products: ExtractedProducts::new(),
            raw_text: None,
            issue: None,
        }
    }
}

impl OutfitSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the photo; earlier extraction results no longer apply
    pub fn upload(&mut self, image: Vec<u8>) {
        self.image = Some(image);
        self.products = ExtractedProducts::new();
        self.raw_text = None;
        self.issue = None;
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Vision output of the last extraction
    pub fn raw_text(&self) -> Option<&str> {
        self.raw_text.as_deref()
    }

    pub fn issue(&self) -> Option<&ExtractionIssue> {
        self.issue.as_ref()
    }
}

/// Outcome of one vision extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub products: ExtractedProducts,
    pub raw_text: String,
    pub issue: Option<ExtractionIssue>,
}

/// Photo → products → recommendations
#[derive(Clone)]
pub struct OutfitFinder {
    vision: Arc<dyn VisionProvider>,
    recommender: RecommendationService,
}

impl OutfitFinder {
    pub fn new(vision: Arc<dyn VisionProvider>, recommender: RecommendationService) -> Self {
        Self {
            vision,
            recommender,
        }
    }

    pub fn recommender(&self) -> &RecommendationService {
        &self.recommender
    }

    /// Ask the vision model for the outfit in `image` and parse its answer.
    ///
    /// Unparseable answers are not errors: the extraction is empty and
    /// carries the issue.
    #[instrument(skip(self, image, instruction), fields(bytes = image.len()))]
    pub async fn extract_image(&self, image: &[u8], instruction: &str) -> OutfitResult<Extraction> {
        if image.is_empty() {
            return Err(OutfitError::InvalidInput("image is empty".to_string()));
        }

        let raw_text = self.vision.extract(image, instruction).await?;
        let parsed = parse_products(&raw_text);
        info!(
            products = parsed.products.len(),
            malformed = parsed.issue.is_some(),
            "Extraction parsed"
        );

        Ok(Extraction {
            products: parsed.products,
            raw_text,
            issue: parsed.issue,
        })
    }

    /// Extract from the session's photo and store the products in the session
    pub async fn extract<'s>(
        &self,
        session: &'s mut OutfitSession,
    ) -> OutfitResult<&'s ExtractedProducts> {
        let image = session
            .image
            .as_deref()
            .ok_or_else(|| OutfitError::InvalidInput("no image uploaded".to_string()))?;

        let extraction = self.extract_image(image, &session.instruction).await?;
        session.products = extraction.products;
        session.raw_text = Some(extraction.raw_text);
        session.issue = extraction.issue;
        Ok(&session.products)
    }

    /// Recommend for the session's current (possibly edited) products
    pub async fn recommend(
        &self,
        session: &OutfitSession,
        options: RecommendOptions,
    ) -> Recommendation {
        self.recommender.recommend(&session.products, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::models::{EmbeddingResult, SearchResult};
    use crate::search::MockSimilaritySearch;
    use crate::vision::MockVisionProvider;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];

    fn finder(vision: MockVisionProvider) -> OutfitFinder {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| {
            Ok(EmbeddingResult {
                values: vec![0.3],
                dimension: 1,
                tokens_used: 1,
            })
        });
        let mut search = MockSimilaritySearch::new();
        search.expect_search().returning(|_| {
            Ok(vec![SearchResult {
                name: Some("Mocassin".to_string()),
                ..Default::default()
            }])
        });
        OutfitFinder::new(
            Arc::new(vision),
            RecommendationService::new(Arc::new(embedder), Arc::new(search)),
        )
    }

    #[tokio::test]
    async fn test_session_flow_with_user_edit() {
        let mut vision = MockVisionProvider::new();
        vision.expect_extract().times(1).returning(|_, _| {
            Ok(r#"Sure! {"product_list": {"shoes": "brown loafers", "hat": "straw hat"}}"#.to_string())
        });
        let finder = finder(vision);

        let mut session = OutfitSession::new();
        session.upload(JPEG.to_vec());
        let products = finder.extract(&mut session).await.unwrap();
        assert_eq!(products.len(), 2);
        assert!(session.issue().is_none());

        session.products.remove("hat");
        session.products.insert("shoes", "brown suede loafers");

        let recommendation = finder.recommend(&session, RecommendOptions::default()).await;
        assert_eq!(recommendation.groups.len(), 1);
        assert_eq!(recommendation.groups[0].query, "shoes: brown suede loafers");
    }

    #[tokio::test]
    async fn test_extract_without_image_is_invalid_input() {
        let finder = finder(MockVisionProvider::new());
        let mut session = OutfitSession::new();
        let err = finder.extract(&mut session).await.unwrap_err();
        assert!(matches!(err, OutfitError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_refusal_yields_empty_products_not_error() {
        let mut vision = MockVisionProvider::new();
        vision
            .expect_extract()
            .returning(|_, _| Ok("Sorry, I can't process that image.".to_string()));
        let finder = finder(vision);

        let extraction = finder.extract_image(JPEG, "describe").await.unwrap();
        assert!(extraction.products.is_empty());
        assert!(extraction.issue.is_none());
    }

    #[tokio::test]
    async fn test_upload_resets_previous_products() {
        let mut session = OutfitSession::new();
        session.products.insert("hat", "cap");
        session.upload(JPEG.to_vec());
        assert!(session.products.is_empty());
        assert_eq!(session.image(), Some(JPEG));
    }
}
