use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::adapters::embeddings::hashing::fnv1a;
use crate::domain::errors::{CollaboratorError, CollaboratorResult};
use crate::domain::ports::ArtifactStore;

/// Content-addressed artifact store: identical bytes get the same id.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the store assigns to `bytes`.
    pub fn content_id(bytes: &[u8]) -> String {
        format!("art-{:016x}-{}", fnv1a(bytes), bytes.len())
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn store(&self, bytes: Vec<u8>) -> CollaboratorResult<String> {
        let id = Self::content_id(&bytes);
        self.artifacts.write().await.entry(id.clone()).or_insert(bytes);
        Ok(id)
    }

    async fn retrieve(&self, artifact_id: &str) -> CollaboratorResult<Vec<u8>> {
        self.artifacts
            .read()
            .await
            .get(artifact_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("artifact {artifact_id}")))
    }
}
