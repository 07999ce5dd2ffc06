//! Handler tests for the outfit domain
//!
//! Upstream services are replaced by mocks, so these cover only the HTTP
//! boundary: request decoding, status codes, response shape and per-entry
//! failure reporting.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use domain_outfit::*;
use http_body_util::BodyExt;
use mockall::mock;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For oneshot()

mock! {
    pub Embedder {}

    #[async_trait]
    impl EmbeddingProvider for Embedder {
        fn model(&self) -> EmbeddingModel;
        async fn embed(&self, text: &str) -> OutfitResult<EmbeddingResult>;
    }
}

mock! {
    pub Vision {}

    #[async_trait]
    impl VisionProvider for Vision {
        async fn extract(&self, image: &[u8], instruction: &str) -> OutfitResult<String>;
    }
}

mock! {
    pub Search {}

    #[async_trait]
    impl SimilaritySearch for Search {
        async fn search(&self, request: SearchRequest) -> OutfitResult<Vec<SearchResult>>;
    }
}

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

// Helper to parse JSON response body
async fn json_body(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn embedding() -> EmbeddingResult {
    EmbeddingResult {
        values: vec![0.25, 0.5],
        dimension: 2,
        tokens_used: 3,
    }
}

fn product(name: &str, price: Price) -> SearchResult {
    SearchResult {
        id: Some(format!("id-{name}")),
        name: Some(name.to_string()),
        subcategory: Some("chaussures".to_string()),
        model_id: None,
        image: Some(format!("https://cdn.example.com/{name}.jpg")),
        price: Some(price),
        score: Some(0.91),
    }
}

fn app(vision: MockVision, embedder: MockEmbedder, search: MockSearch) -> Router {
    let recommender = RecommendationService::new(Arc::new(embedder), Arc::new(search));
    handlers::router(OutfitFinder::new(Arc::new(vision), recommender))
}

#[tokio::test]
async fn test_extract_returns_products_in_model_order() {
    let mut vision = MockVision::new();
    vision
        .expect_extract()
        .withf(|image, instruction| image.starts_with(b"\x89PNG") && instruction.contains("outfit"))
        .times(1)
        .returning(|_, _| {
            Ok("```json\n{\"product_list\": {\"top\": \"white tee\", \"bottom\": \"blue jeans\"}}\n```".to_string())
        });

    let app = app(vision, MockEmbedder::new(), MockSearch::new());
    let response = app
        .oneshot(post_json(
            "/extract",
            json!({ "image_base64": STANDARD.encode(PNG), "instruction": "Describe the outfit" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    let categories: Vec<&String> = body["products"].as_object().unwrap().keys().collect();
    assert_eq!(categories, vec!["top", "bottom"]);
    assert!(body.get("warning").is_none());
}

#[tokio::test]
async fn test_extract_malformed_output_returns_empty_with_warning() {
    let mut vision = MockVision::new();
    vision
        .expect_extract()
        .returning(|_, _| Ok("{\"product_list\": {\"hat\": \"cap\"".to_string()));

    let app = app(vision, MockEmbedder::new(), MockSearch::new());
    let response = app
        .oneshot(post_json("/extract", json!({ "image_base64": STANDARD.encode(PNG) })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["products"], json!({}));
    assert!(body["warning"].as_str().unwrap().contains("no parseable JSON"));
}

#[tokio::test]
async fn test_extract_rejects_invalid_base64() {
    let mut vision = MockVision::new();
    vision.expect_extract().never();

    let app = app(vision, MockEmbedder::new(), MockSearch::new());
    let response = app
        .oneshot(post_json("/extract", json!({ "image_base64": "not base64!" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"], "INVALID_INPUT");
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_extract_upstream_failure_maps_to_bad_gateway() {
    let mut vision = MockVision::new();
    vision.expect_extract().returning(|_, _| {
        Err(OutfitError::Service {
            service: "vision",
            status: Some(401),
            message: "invalid api key".to_string(),
            retryable: false,
        })
    });

    let app = app(vision, MockEmbedder::new(), MockSearch::new());
    let response = app
        .oneshot(post_json("/extract", json!({ "image_base64": STANDARD.encode(PNG) })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"], "SERVICE_ERROR");
}

#[tokio::test]
async fn test_recommend_groups_results_and_reports_failures() {
    let mut embedder = MockEmbedder::new();
    embedder
        .expect_embed()
        .withf(|text| text == "shoes: red leather sneakers")
        .returning(|_| Ok(embedding()));
    embedder
        .expect_embed()
        .withf(|text| text == "hat: blue cap")
        .returning(|_| Err(OutfitError::service("embedding", "bad request")));

    let mut search = MockSearch::new();
    search
        .expect_search()
        .withf(|request| request.top_k == 2)
        .times(1)
        .returning(|_| {
            Ok(vec![
                product("sneaker-rouge", Price::Text("89,00 €".to_string())),
                product("basket-cuir", Price::Amount(120.0)),
            ])
        });

    let app = app(MockVision::new(), embedder, search);
    let response = app
        .oneshot(post_json(
            "/recommend",
            json!({
                "products": { "shoes": "red leather sneakers", "hat": "blue cap" },
                "top_k": 2
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["price"], "89,00 €");
    assert_eq!(body["results"][1]["price"], 120.0);
    assert_eq!(body["groups"][0]["category"], "shoes");
    assert_eq!(body["failures"][0]["category"], "hat");
    assert_eq!(body["failures"][0]["error"], "SERVICE_ERROR");
}

#[tokio::test]
async fn test_recommend_empty_products_is_empty_result() {
    let mut embedder = MockEmbedder::new();
    embedder.expect_embed().never();
    let mut search = MockSearch::new();
    search.expect_search().never();

    let app = app(MockVision::new(), embedder, search);
    let response = app
        .oneshot(post_json("/recommend", json!({ "products": {} })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(
        body,
        json!({ "results": [], "groups": [], "failures": [] })
    );
}

#[tokio::test]
async fn test_recommend_rejects_zero_top_k() {
    let app = app(MockVision::new(), MockEmbedder::new(), MockSearch::new());
    let response = app
        .oneshot(post_json(
            "/recommend",
            json!({ "products": { "hat": "cap" }, "top_k": 0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_non_object_products_is_empty_result() {
    for products in [json!([]), json!(null), json!("shoes")] {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().never();
        let mut search = MockSearch::new();
        search.expect_search().never();

        let app = app(MockVision::new(), embedder, search);
        let response = app
            .oneshot(post_json("/recommend", json!({ "products": products.clone() })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{products}");
        let body = json_body(response.into_body()).await;
        assert_eq!(body, json!({ "results": [], "groups": [], "failures": [] }));
    }
}

#[tokio::test]
async fn test_recommend_missing_products_is_empty_result() {
    let app = app(MockVision::new(), MockEmbedder::new(), MockSearch::new());
    let response = app
        .oneshot(post_json("/recommend", json!({ "top_k": 2 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["groups"], json!([]));
}

#[tokio::test]
async fn test_recommend_non_string_description_is_embedded_as_json_text() {
    let mut embedder = MockEmbedder::new();
    embedder
        .expect_embed()
        .withf(|text| text == "count: 3")
        .times(1)
        .returning(|_| Ok(embedding()));
    let mut search = MockSearch::new();
    search
        .expect_search()
        .times(1)
        .returning(|_| Ok(vec![product("bague-soleil", Price::Amount(39.9))]));

    let app = app(MockVision::new(), embedder, search);
    let response = app
        .oneshot(post_json("/recommend", json!({ "products": { "count": 3 } })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["groups"][0]["category"], "count");
    assert_eq!(body["groups"][0]["description"], "3");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}
