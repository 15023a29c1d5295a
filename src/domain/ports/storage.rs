//! Artifact storage port.

use async_trait::async_trait;

use crate::domain::errors::CollaboratorResult;

/// Binary artifact storage addressed by opaque ids.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` and return the artifact id.
    async fn store(&self, bytes: Vec<u8>) -> CollaboratorResult<String>;

    /// Fetch previously stored bytes.
    async fn retrieve(&self, artifact_id: &str) -> CollaboratorResult<Vec<u8>>;
}
