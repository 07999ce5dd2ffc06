//! Health check endpoints

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use database::mongodb::check_health_detailed;
use mongodb::Database;
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    mongodb: bool,
    response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// `GET /health` (liveness) and `GET /ready` (MongoDB ping)
pub fn router(db: Database) -> Router {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/ready", get(readiness_check))
        .with_state(db)
}

async fn liveness_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - verifies the MongoDB connection
async fn readiness_check(State(db): State<Database>) -> (StatusCode, Json<ReadyResponse>) {
    let health = check_health_detailed(&db).await;
    if let Some(message) = &health.message {
        tracing::error!(error = %message, "Readiness check failed: mongodb");
    }

    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            status: if health.healthy { "ready" } else { "unhealthy" },
            mongodb: health.healthy,
            response_time_ms: health.response_time_ms,
            message: health.message,
        }),
    )
}
