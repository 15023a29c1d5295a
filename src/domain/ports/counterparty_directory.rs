//! Read-only lookup of counterparty profiles.

use async_trait::async_trait;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::CounterpartyProfile;

#[async_trait]
pub trait CounterpartyDirectory: Send + Sync {
    /// Profile for `id`, or `None` if the directory does not know it.
    async fn get(&self, id: &str) -> CollaboratorResult<Option<CounterpartyProfile>>;
}
