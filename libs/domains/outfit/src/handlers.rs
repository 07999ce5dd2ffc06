//! HTTP handlers for the outfit finder API

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::error::{ErrorResponse, OutfitError, OutfitResult};
use crate::finder::OutfitFinder;
use crate::models::{EqualityFilter, ExtractedProducts, Price, SearchResult};
use crate::recommend::{EntryFailure, RecommendOptions, RecommendationGroup};
use crate::search::MAX_TOP_K;

/// Uploaded photos arrive base64-encoded inside JSON
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(extract_products, recommend_products),
    components(schemas(
        ExtractRequest,
        ExtractResponse,
        RecommendRequest,
        RecommendResponse,
        RecommendationGroup,
        EntryFailure,
        SearchResult,
        Price,
        EqualityFilter,
        ErrorResponse
    )),
    tags((name = "Outfit", description = "Outfit extraction and product recommendation"))
)]
pub struct ApiDoc;

/// Routes: `POST /extract`, `POST /recommend`
pub fn router(finder: OutfitFinder) -> Router {
    Router::new()
        .route("/extract", post(extract_products))
        .route("/recommend", post(recommend_products))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(Arc::new(finder))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExtractRequest {
    /// Photo bytes, base64; a `data:image/...;base64,` prefix is accepted
    pub image_base64: String,
    /// Overrides the default extraction instruction
    pub instruction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExtractResponse {
    /// Category → description, in the order the model listed them
    #[schema(value_type = Object)]
    pub products: ExtractedProducts,
    pub raw_text: String,
    /// Set when the model answer could not be parsed into products
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecommendRequest {
    /// Category → description, possibly edited after extraction. Anything
    /// other than an object is treated as an empty mapping.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub products: ExtractedProducts,
    /// Matches per product (default from configuration)
    pub top_k: Option<u32>,
    pub filter: Option<EqualityFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecommendResponse {
    /// All matches, grouped by input order
    pub results: Vec<SearchResult>,
    pub groups: Vec<RecommendationGroup>,
    pub failures: Vec<EntryFailure>,
}

fn decode_image(encoded: &str) -> OutfitResult<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(OutfitError::InvalidInput("image_base64 is empty".to_string()));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| OutfitError::InvalidInput(format!("image_base64 is not valid base64: {e}")))
}

/// Extract outfit items from a photo
#[utoipa::path(
    post,
    path = "/extract",
    tag = "Outfit",
    request_body = ExtractRequest,
    responses(
        (status = 200, description = "Extracted products", body = ExtractResponse),
        (status = 400, description = "Missing or unsupported image", body = ErrorResponse),
        (status = 502, description = "Vision service failed", body = ErrorResponse),
        (status = 504, description = "Vision service timed out", body = ErrorResponse)
    )
)]
async fn extract_products(
    State(finder): State<Arc<OutfitFinder>>,
    Json(request): Json<ExtractRequest>,
) -> OutfitResult<Json<ExtractResponse>> {
    let image = decode_image(&request.image_base64)?;
    let instruction = request.instruction.unwrap_or_default();

    let extraction = finder.extract_image(&image, &instruction).await?;
    Ok(Json(ExtractResponse {
        products: extraction.products,
        raw_text: extraction.raw_text,
        warning: extraction.issue.map(|issue| issue.message()),
    }))
}

/// Recommend catalogue products for each extracted item
#[utoipa::path(
    post,
    path = "/recommend",
    tag = "Outfit",
    request_body = RecommendRequest,
    responses(
        (status = 200, description = "Matches per product; failed products are listed separately", body = RecommendResponse),
        (status = 400, description = "Invalid top_k", body = ErrorResponse)
    )
)]
async fn recommend_products(
    State(finder): State<Arc<OutfitFinder>>,
    Json(request): Json<RecommendRequest>,
) -> OutfitResult<Json<RecommendResponse>> {
    if let Some(top_k) = request.top_k {
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(OutfitError::InvalidInput(format!(
                "top_k must be between 1 and {MAX_TOP_K}"
            )));
        }
    }

    let options = RecommendOptions {
        top_k: request.top_k,
        filter: request.filter,
    };
    let recommendation = finder.recommender().recommend(&request.products, options).await;

    Ok(Json(RecommendResponse {
        results: recommendation.results(),
        groups: recommendation.groups,
        failures: recommendation.failures,
    }))
}
