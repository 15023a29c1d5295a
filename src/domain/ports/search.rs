//! Similarity search port used by matching.

use async_trait::async_trait;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::SearchHit;

/// Black-box similarity search over counterparty profiles.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Return up to `limit` hits for `query`, best first, scores in `[0, 1]`.
    async fn search(&self, query: &str, limit: usize) -> CollaboratorResult<Vec<SearchHit>>;
}
