use core_config::{ConfigError, FromEnv, env_list, env_or_default, env_parse, env_required};
use std::str::FromStr;
use std::time::Duration;

use crate::models::EmbeddingModel;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_PRODUCTS_COLLECTION: &str = "products";
pub const DEFAULT_VECTOR_INDEX: &str = "product_embedding_index";
pub const DEFAULT_EMBEDDING_FIELD: &str = "embedding";
pub const DEFAULT_BACKFILL_FIELDS: &[&str] = &["name", "subcategory", "category", "variation_0_color"];

/// Settings for the extraction and recommendation pipeline.
///
/// Every external name (collection, index, field, models) lives here so the
/// backfill and the query path cannot drift apart.
///
/// Environment variables:
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_BASE_URL` (default: `https://api.openai.com/v1`)
/// - `OUTFIT_EMBEDDING_MODEL` (default: `text-embedding-ada-002`)
/// - `OUTFIT_VISION_MODEL` (default: `gpt-4o`)
/// - `OUTFIT_VISION_MAX_TOKENS` (default: 300)
/// - `OUTFIT_HTTP_TIMEOUT_SECS` (default: 60)
/// - `OUTFIT_PRODUCTS_COLLECTION` (default: `products`)
/// - `OUTFIT_VECTOR_INDEX` (default: `product_embedding_index`)
/// - `OUTFIT_EMBEDDING_FIELD` (default: `embedding`)
/// - `OUTFIT_TOP_K` (default: 1)
/// - `OUTFIT_CANDIDATE_MULTIPLIER` (default: 10)
/// - `OUTFIT_MAX_CONCURRENCY` (default: 4)
/// - `OUTFIT_MAX_RETRIES` (default: 3)
/// - `OUTFIT_BACKFILL_FIELDS` (default: `name,subcategory,category,variation_0_color`)
#[derive(Clone, Debug)]
pub struct OutfitConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: EmbeddingModel,
    pub vision_model: String,
    pub vision_max_tokens: u32,
    pub http_timeout: Duration,
    pub products_collection: String,
    pub vector_index: String,
    pub embedding_field: String,
    pub default_top_k: u32,
    pub candidate_multiplier: u32,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub backfill_fields: Vec<String>,
}

impl OutfitConfig {
    /// Defaults with the given API key
    pub fn new(openai_api_key: impl Into<String>) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_model: EmbeddingModel::default(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            vision_max_tokens: 300,
            http_timeout: Duration::from_secs(60),
            products_collection: DEFAULT_PRODUCTS_COLLECTION.to_string(),
            vector_index: DEFAULT_VECTOR_INDEX.to_string(),
            embedding_field: DEFAULT_EMBEDDING_FIELD.to_string(),
            default_top_k: 1,
            candidate_multiplier: 10,
            max_concurrency: 4,
            max_retries: 3,
            backfill_fields: DEFAULT_BACKFILL_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.openai_base_url = base_url.into();
        self
    }

    /// Reject values that would make the pipeline misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("OUTFIT_TOP_K", self.default_top_k as usize),
            ("OUTFIT_CANDIDATE_MULTIPLIER", self.candidate_multiplier as usize),
            ("OUTFIT_MAX_CONCURRENCY", self.max_concurrency),
            ("OUTFIT_VISION_MAX_TOKENS", self.vision_max_tokens as usize),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::ParseError {
                    key: key.to_string(),
                    details: "must be greater than zero".to_string(),
                });
            }
        }
        if self.backfill_fields.is_empty() {
            return Err(ConfigError::ParseError {
                key: "OUTFIT_BACKFILL_FIELDS".to_string(),
                details: "at least one field is required".to_string(),
            });
        }
        Ok(())
    }
}

impl FromEnv for OutfitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let embedding_model = env_or_default("OUTFIT_EMBEDDING_MODEL", "text-embedding-ada-002");
        let embedding_model =
            EmbeddingModel::from_str(embedding_model.trim()).map_err(|e| ConfigError::ParseError {
                key: "OUTFIT_EMBEDDING_MODEL".to_string(),
                details: format!("{e}: '{embedding_model}'"),
            })?;

        let config = Self {
            openai_api_key: env_required("OPENAI_API_KEY")?,
            openai_base_url: env_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            embedding_model,
            vision_model: env_or_default("OUTFIT_VISION_MODEL", DEFAULT_VISION_MODEL),
            vision_max_tokens: env_parse("OUTFIT_VISION_MAX_TOKENS", 300)?,
            http_timeout: Duration::from_secs(env_parse("OUTFIT_HTTP_TIMEOUT_SECS", 60)?),
            products_collection: env_or_default(
                "OUTFIT_PRODUCTS_COLLECTION",
                DEFAULT_PRODUCTS_COLLECTION,
            ),
            vector_index: env_or_default("OUTFIT_VECTOR_INDEX", DEFAULT_VECTOR_INDEX),
            embedding_field: env_or_default("OUTFIT_EMBEDDING_FIELD", DEFAULT_EMBEDDING_FIELD),
            default_top_k: env_parse("OUTFIT_TOP_K", 1)?,
            candidate_multiplier: env_parse("OUTFIT_CANDIDATE_MULTIPLIER", 10)?,
            max_concurrency: env_parse("OUTFIT_MAX_CONCURRENCY", 4)?,
            max_retries: env_parse("OUTFIT_MAX_RETRIES", 3)?,
            backfill_fields: env_list("OUTFIT_BACKFILL_FIELDS", DEFAULT_BACKFILL_FIELDS),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("OPENAI_API_KEY", Some("sk-test")),
                ("OPENAI_BASE_URL", None),
                ("OUTFIT_EMBEDDING_MODEL", None),
                ("OUTFIT_TOP_K", None),
                ("OUTFIT_MAX_CONCURRENCY", None),
                ("OUTFIT_BACKFILL_FIELDS", None),
            ],
            || {
                let config = OutfitConfig::from_env().unwrap();
                assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
                assert_eq!(config.embedding_model, EmbeddingModel::TextEmbeddingAda002);
                assert_eq!(config.vector_index, "product_embedding_index");
                assert_eq!(config.embedding_field, "embedding");
                assert_eq!(config.default_top_k, 1);
                assert_eq!(config.max_concurrency, 4);
                assert_eq!(config.backfill_fields.len(), 4);
            },
        );
    }

    #[test]
    fn test_from_env_missing_api_key() {
        temp_env::with_var("OPENAI_API_KEY", Some("  "), || {
            let err = OutfitConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_API_KEY"));
        });
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("OPENAI_API_KEY", Some("sk-test")),
                ("OPENAI_BASE_URL", Some("http://localhost:9999/v1/")),
                ("OUTFIT_EMBEDDING_MODEL", Some("text-embedding-3-large")),
                ("OUTFIT_TOP_K", Some("3")),
                ("OUTFIT_BACKFILL_FIELDS", Some("name, description")),
            ],
            || {
                let config = OutfitConfig::from_env().unwrap();
                assert_eq!(config.openai_base_url, "http://localhost:9999/v1");
                assert_eq!(config.embedding_model.dimension(), 3072);
                assert_eq!(config.default_top_k, 3);
                assert_eq!(config.backfill_fields, vec!["name", "description"]);
            },
        );
    }

    #[test]
    fn test_from_env_rejects_unknown_model() {
        temp_env::with_vars(
            [
                ("OPENAI_API_KEY", Some("sk-test")),
                ("OUTFIT_EMBEDDING_MODEL", Some("glove-300")),
            ],
            || {
                let err = OutfitConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("OUTFIT_EMBEDDING_MODEL"));
            },
        );
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = OutfitConfig::new("sk-test");
        assert!(config.validate().is_ok());
        config.max_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
