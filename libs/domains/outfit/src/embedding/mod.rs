mod openai;
mod provider;

pub use openai::OpenAIEmbeddingProvider;
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
