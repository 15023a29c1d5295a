//! Embedding provider adapters.

pub mod hashing;
pub mod openai;

use std::sync::Arc;

use crate::domain::models::EmbeddingsConfig;
use crate::domain::ports::EmbeddingProvider;

pub use hashing::HashingEmbeddingProvider;
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};

/// Build the provider named in configuration.
pub fn from_config(config: &EmbeddingsConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbeddingProvider::new(config.dimension))),
        "openai" => Ok(Arc::new(OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig::from(config))?)),
        other => anyhow::bail!("Unknown embedding provider: {other}"),
    }
}
