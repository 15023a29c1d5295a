use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason reported when a release is refused because validation did not pass.
pub const HELD_FOR_QA: &str = "Payment held due to QA failure";

/// Ledger-side status of an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Active,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
            Self::Refunded => "refunded",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Cached view of a ledger escrow, one per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub escrow_id: String,
    pub job_id: Uuid,
    pub amount: f64,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

/// Result of a release request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRelease {
    pub job_id: Uuid,
    pub escrow_id: String,
    pub released: bool,
    pub amount: f64,
    /// Ledger transaction reference when released.
    pub transaction_ref: Option<String>,
    /// Why the release was held, when it was.
    pub reason: Option<String>,
}

impl PaymentRelease {
    pub fn released(record: &EscrowRecord, transaction_ref: String) -> Self {
        Self {
            job_id: record.job_id,
            escrow_id: record.escrow_id.clone(),
            released: true,
            amount: record.amount,
            transaction_ref: Some(transaction_ref),
            reason: None,
        }
    }

    pub fn held(record: &EscrowRecord, reason: impl Into<String>) -> Self {
        Self {
            job_id: record.job_id,
            escrow_id: record.escrow_id.clone(),
            released: false,
            amount: 0.0,
            transaction_ref: None,
            reason: Some(reason.into()),
        }
    }
}
