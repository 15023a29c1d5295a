//! Domain errors for the GigNova job lifecycle.

use thiserror::Error;
use uuid::Uuid;

use super::models::job::JobState;
use super::models::thresholds::StageKind;

/// Errors surfaced by the orchestrator's public operations.
///
/// Stage failures carry the job id so the caller can inspect or cancel the job
/// that was left behind in its last reached state.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid job spec: {0}")]
    InvalidSpec(String),

    #[error("No counterparty met the matching threshold for job {job_id}")]
    NoMatches { job_id: Uuid },

    #[error("Negotiation for job {job_id} did not converge after {rounds} rounds")]
    NegotiationFailed { job_id: Uuid, rounds: u32 },

    /// The ledger refused, failed, or timed out while opening, releasing, or
    /// reading an escrow.
    #[error("Escrow failed for job {job_id}: {reason}")]
    EscrowFailed { job_id: Uuid, reason: String },

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot {operation} job {job_id} while it is {from}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobState,
        operation: &'static str,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures reported by external collaborators (search, ledger, storage,
/// embedding) or by the task wrapper that calls them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{stage} call timed out after {timeout_ms}ms")]
    Timeout { stage: StageKind, timeout_ms: u64 },

    #[error("collaborator task failed: {0}")]
    TaskFailed(String),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

impl CollaboratorError {
    /// Whether this failure came from the call deadline rather than the backend.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
