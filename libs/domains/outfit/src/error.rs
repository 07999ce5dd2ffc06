use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use core_config::ConfigError;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum OutfitError {
    /// An upstream call (embedding, vision, vector search) failed or timed out
    #[error("{service} service error: {message}")]
    Service {
        service: &'static str,
        status: Option<u16>,
        message: String,
        retryable: bool,
    },

    #[error("Malformed extraction: {0}")]
    MalformedExtraction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OutfitResult<T> = Result<T, OutfitError>;

impl OutfitError {
    /// Non-retryable upstream failure without an HTTP status
    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        OutfitError::Service {
            service,
            status: None,
            message: message.into(),
            retryable: false,
        }
    }

    /// Upstream answered with a non-success status; 429 and 5xx are retryable
    pub fn from_status(service: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        OutfitError::Service {
            service,
            status: Some(status.as_u16()),
            message: format!("{} returned {}: {}", service, status, body.trim()),
            retryable: status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error(),
        }
    }

    /// Transport failure; timeouts and connection errors are retryable
    pub fn from_transport(service: &'static str, err: reqwest::Error) -> Self {
        OutfitError::Service {
            service,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            retryable: err.is_timeout() || err.is_connect() || err.is_request(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OutfitError::Service { retryable: true, .. })
    }

    /// Machine-readable identifier used in HTTP error bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            OutfitError::Service { .. } => "SERVICE_ERROR",
            OutfitError::MalformedExtraction(_) => "MALFORMED_EXTRACTION",
            OutfitError::InvalidInput(_) => "INVALID_INPUT",
            OutfitError::Config(_) => "CONFIGURATION_ERROR",
            OutfitError::Database(_) => "DATABASE_ERROR",
            OutfitError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            OutfitError::Service {
                status: None,
                retryable: true,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            OutfitError::Service { .. } => StatusCode::BAD_GATEWAY,
            OutfitError::MalformedExtraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OutfitError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OutfitError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            OutfitError::Config(_) | OutfitError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<mongodb::error::Error> for OutfitError {
    fn from(err: mongodb::error::Error) -> Self {
        OutfitError::Database(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for OutfitError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        OutfitError::Internal(format!("BSON decode error: {}", err))
    }
}

impl From<serde_json::Error> for OutfitError {
    fn from(err: serde_json::Error) -> Self {
        OutfitError::Internal(format!("JSON error: {}", err))
    }
}

impl From<ConfigError> for OutfitError {
    fn from(err: ConfigError) -> Self {
        OutfitError::Config(err.to_string())
    }
}

/// JSON error body returned by the HTTP boundary
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status code
    pub code: u16,
    /// Machine-readable error identifier, e.g. `INVALID_INPUT`
    pub error: String,
    pub message: String,
}

impl IntoResponse for OutfitError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error_kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::warn!(error_kind = self.kind(), error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
