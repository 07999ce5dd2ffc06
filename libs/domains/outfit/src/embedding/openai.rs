use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::EmbeddingProvider;
use crate::error::{OutfitError, OutfitResult};
use crate::models::{EmbeddingModel, EmbeddingResult};
use crate::openai::{OpenAIConfig, send_json};

const SERVICE: &str = "embedding";

/// OpenAI `/embeddings` client
pub struct OpenAIEmbeddingProvider {
    client: Client,
    config: OpenAIConfig,
    model: EmbeddingModel,
}

impl OpenAIEmbeddingProvider {
    pub fn new(config: OpenAIConfig, model: EmbeddingModel) -> OutfitResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
            model,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}

/// Check the returned vector against the model's published dimension
fn into_result(model: EmbeddingModel, response: EmbeddingResponse) -> OutfitResult<EmbeddingResult> {
    let tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or_default();
    let values = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| OutfitError::service(SERVICE, "no embedding returned"))?;

    let dimension = values.len() as u32;
    if dimension != model.dimension() {
        return Err(OutfitError::service(
            SERVICE,
            format!(
                "{} returned {} dimensions, expected {}",
                model,
                dimension,
                model.dimension()
            ),
        ));
    }

    Ok(EmbeddingResult {
        values,
        dimension,
        tokens_used,
    })
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn model(&self) -> EmbeddingModel {
        self.model
    }

    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> OutfitResult<EmbeddingResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OutfitError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let url = self.config.endpoint("embeddings");
        let request = EmbeddingRequest {
            model: self.model.model_name(),
            input: text,
        };

        let response: EmbeddingResponse =
            send_json(SERVICE, &self.config, || self.client.post(&url).json(&request)).await?;
        let result = into_result(self.model, response)?;

        debug!(tokens = result.tokens_used, "Embedding generated");
        Ok(result)
    }
}
