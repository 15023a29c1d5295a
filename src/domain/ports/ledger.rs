//! Escrow ledger port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::EscrowStatus;

/// Parameters for opening an escrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowRequest {
    pub payer: String,
    pub payee: String,
    pub amount: f64,
    pub job_id: Uuid,
}

/// Ledger that holds and releases funds.
///
/// The ledger owns escrow state; callers only keep a reference and a cached status.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Open an escrow and return its id.
    async fn create_escrow(&self, request: &EscrowRequest) -> CollaboratorResult<String>;

    /// Release an escrow to the payee and return the transaction reference.
    async fn release_escrow(&self, escrow_id: &str) -> CollaboratorResult<String>;

    /// Current status of an escrow.
    async fn get_status(&self, escrow_id: &str) -> CollaboratorResult<EscrowStatus>;
}
