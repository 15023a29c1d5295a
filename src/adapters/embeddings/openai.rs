//! OpenAI embedding provider adapter.
//!
//! Calls the `/embeddings` endpoint of the OpenAI API or any compatible
//! server (Azure OpenAI, local inference servers).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::{CollaboratorError, CollaboratorResult};
use crate::domain::models::EmbeddingsConfig;
use crate::domain::ports::EmbeddingProvider;

/// Configuration for the OpenAI embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    /// API key. Falls back to the variable named by `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// Base URL for the API. Default: `https://api.openai.com/v1`.
    pub base_url: String,
    /// Embedding model. Default: `text-embedding-3-small`.
    pub model: String,
    /// Expected embedding dimension. Default: 1536.
    pub dimension: usize,
    /// Request timeout in seconds. Default: 30.
    pub timeout_secs: u64,
}

impl Default for OpenAiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 30,
        }
    }
}

impl From<&EmbeddingsConfig> for OpenAiEmbeddingConfig {
    fn from(config: &EmbeddingsConfig) -> Self {
        Self {
            api_key: None,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl OpenAiEmbeddingConfig {
    fn get_api_key(&self) -> CollaboratorResult<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .ok_or_else(|| {
                CollaboratorError::Rejected(format!(
                    "OpenAI API key not set. Set {} or configure api_key.",
                    self.api_key_env
                ))
            })
    }
}

/// OpenAI embedding provider.
pub struct OpenAiEmbeddingProvider {
    config: OpenAiEmbeddingConfig,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiEmbeddingConfig) -> CollaboratorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn call_embeddings_api(&self, texts: Vec<String>) -> CollaboratorResult<Vec<Vec<f32>>> {
        let api_key = self.config.get_api_key()?;
        let url = format!("{}/embeddings", self.config.base_url);
        let expected = texts.len();

        let request_body = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("Embedding API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            let message = format!("Embedding API returned {status}: {body}");
            return Err(if status.is_client_error() {
                CollaboratorError::Rejected(message)
            } else {
                CollaboratorError::Unavailable(message)
            });
        }

        let result: EmbeddingsResponse = response.json().await.map_err(|e| {
            CollaboratorError::Rejected(format!("Failed to parse embedding response: {e}"))
        })?;

        // Sort by index to maintain input order
        let mut data = result.data;
        data.sort_by_key(|d| d.index);
        if data.len() != expected {
            return Err(CollaboratorError::Rejected(format!(
                "Embedding API returned {} vectors for {expected} inputs",
                data.len()
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> CollaboratorResult<Vec<f32>> {
        let results = self.call_embeddings_api(vec![text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::Rejected("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> CollaboratorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.call_embeddings_api(texts.to_vec()).await
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::ServerGuard) -> OpenAiEmbeddingConfig {
        OpenAiEmbeddingConfig {
            api_key: Some("test-key".to_string()),
            base_url: server.url(),
            dimension: 3,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = OpenAiEmbeddingConfig::default();
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_from_embeddings_config_trims_slash() {
        let embeddings = EmbeddingsConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let config = OpenAiEmbeddingConfig::from(&embeddings);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_api_key_from_config() {
        let config = OpenAiEmbeddingConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        assert_eq!(config.get_api_key().unwrap(), "test-key");
    }

    #[test]
    fn test_api_key_missing() {
        let config = OpenAiEmbeddingConfig {
            api_key: None,
            api_key_env: "GIGNOVA_TEST_UNSET_OPENAI_KEY".to_string(),
            ..Default::default()
        };
        temp_env::with_var_unset("GIGNOVA_TEST_UNSET_OPENAI_KEY", || {
            assert!(matches!(config.get_api_key(), Err(CollaboratorError::Rejected(_))));
        });
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[
                    {"embedding":[0.0,1.0,0.0],"index":1},
                    {"embedding":[1.0,0.0,0.0],"index":0}
                ]}"#,
            )
            .create_async()
            .await;

        let provider = OpenAiEmbeddingProvider::new(config_for(&server)).unwrap();
        let vectors = provider
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = OpenAiEmbeddingProvider::new(config_for(&server)).unwrap();
        match provider.embed("text").await {
            Err(CollaboratorError::Unavailable(msg)) => assert!(msg.contains("503")),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(401)
            .with_body(r#"{"error":"bad key"}"#)
            .create_async()
            .await;

        let provider = OpenAiEmbeddingProvider::new(config_for(&server)).unwrap();
        assert!(matches!(provider.embed("text").await, Err(CollaboratorError::Rejected(_))));
    }
}
