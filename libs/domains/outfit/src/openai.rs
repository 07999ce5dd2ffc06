//! Connection settings shared by the OpenAI embedding and vision clients.

use database::common::{RetryConfig, retry_if};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::OutfitConfig;
use crate::error::{OutfitError, OutfitResult};

/// OpenAI API credentials, endpoint and call policy
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: crate::config::DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            retry: RetryConfig::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// HTTP client with the configured timeout
    pub(crate) fn http_client(&self) -> OutfitResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| OutfitError::Config(format!("failed to build HTTP client: {e}")))
    }
}

impl From<&OutfitConfig> for OpenAIConfig {
    fn from(config: &OutfitConfig) -> Self {
        Self::new(config.openai_api_key.clone())
            .with_base_url(config.openai_base_url.clone())
            .with_timeout(config.http_timeout)
            .with_retry(RetryConfig::new().with_max_retries(config.max_retries))
    }
}

/// Send an authenticated JSON request, retrying rate limits, 5xx and
/// transport failures, and decode the success body.
pub(crate) async fn send_json<T, F>(
    service: &'static str,
    config: &OpenAIConfig,
    build: F,
) -> OutfitResult<T>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let build = &build;
    retry_if(
        || async move {
            let response = build()
                .bearer_auth(&config.api_key)
                .send()
                .await
                .map_err(|e| OutfitError::from_transport(service, e))?;
            decode(service, response).await
        },
        config.retry.clone(),
        OutfitError::is_retryable,
    )
    .await
}

async fn decode<T: DeserializeOwned>(service: &'static str, response: Response) -> OutfitResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OutfitError::from_status(service, status, &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| OutfitError::service(service, format!("unexpected response body: {e}")))
}
