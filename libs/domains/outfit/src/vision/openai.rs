use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::VisionProvider;
use super::image::data_url;
use crate::error::{OutfitError, OutfitResult};
use crate::openai::{OpenAIConfig, send_json};

const SERVICE: &str = "vision";

/// Instruction used when the caller does not supply one
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful AI assistant. Extract the outfit from \
the photo. Answer with JSON only, in the form {\"product_list\": {\"<category>\": \"<detailed \
description>\"}}, with one entry per clothing item or accessory.";

/// OpenAI chat completions client with image input
pub struct OpenAIVisionProvider {
    client: Client,
    config: OpenAIConfig,
    model: String,
    max_tokens: u32,
}

impl OpenAIVisionProvider {
    pub fn new(config: OpenAIConfig, model: impl Into<String>, max_tokens: u32) -> OutfitResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
            model: model.into(),
            max_tokens,
        })
    }

    fn request<'a>(&'a self, instruction: &'a str, image_url: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: instruction },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url,
                            detail: "high",
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl VisionProvider for OpenAIVisionProvider {
    #[instrument(skip(self, image, instruction), fields(model = %self.model, bytes = image.len()))]
    async fn extract(&self, image: &[u8], instruction: &str) -> OutfitResult<String> {
        let image_url = data_url(image)?;
        let instruction = match instruction.trim() {
            "" => DEFAULT_INSTRUCTION,
            text => text,
        };

        let url = self.config.endpoint("chat/completions");
        let request = self.request(instruction, &image_url);

        let response: ChatResponse =
            send_json(SERVICE, &self.config, || self.client.post(&url).json(&request)).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OutfitError::service(SERVICE, "no completion returned"))?;

        debug!(finish_reason = ?choice.finish_reason, "Vision completion received");
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OpenAIVisionProvider {
        OpenAIVisionProvider::new(
            OpenAIConfig::new("sk-test").with_base_url("http://127.0.0.1:9"),
            "gpt-4o",
            300,
        )
        .unwrap()
    }

    #[test]
    fn test_request_shape() {
        let provider = provider();
        let request = provider.request("describe", "data:image/png;base64,AAAA");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "describe"},
                        {"type": "image_url", "image_url": {
                            "url": "data:image/png;base64,AAAA",
                            "detail": "high"
                        }}
                    ]
                }],
                "max_tokens": 300
            })
        );
    }

    #[test]
    fn test_response_tolerates_null_content() {
        let body = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": null}, "finish_reason": "length"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn test_extract_rejects_unknown_image_before_calling_api() {
        let err = provider().extract(b"not an image", "describe").await.unwrap_err();
        assert!(matches!(err, OutfitError::InvalidInput(_)));
    }
}
