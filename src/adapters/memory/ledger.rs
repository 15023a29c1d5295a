use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{CollaboratorError, CollaboratorResult};
use crate::domain::models::EscrowStatus;
use crate::domain::ports::{EscrowRequest, Ledger};

/// Escrow held by the in-memory ledger.
#[derive(Debug, Clone)]
pub struct LedgerEscrow {
    pub request: EscrowRequest,
    pub status: EscrowStatus,
    pub transaction_ref: Option<String>,
}

/// In-memory ledger with call counters and switchable failures.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    escrows: RwLock<HashMap<String, LedgerEscrow>>,
    create_calls: AtomicUsize,
    release_calls: AtomicUsize,
    fail_create: AtomicBool,
    fail_release: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create_escrow` calls fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `release_escrow` calls fail.
    pub fn set_fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub async fn escrow(&self, escrow_id: &str) -> Option<LedgerEscrow> {
        self.escrows.read().await.get(escrow_id).cloned()
    }

    /// Escrows opened for `job_id`.
    pub async fn escrows_for_job(&self, job_id: Uuid) -> Vec<LedgerEscrow> {
        self.escrows
            .read()
            .await
            .values()
            .filter(|e| e.request.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_escrow(&self, request: &EscrowRequest) -> CollaboratorResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("ledger rejected connection".to_string()));
        }
        if !(request.amount.is_finite() && request.amount > 0.0) {
            return Err(CollaboratorError::Rejected(format!(
                "invalid escrow amount {}",
                request.amount
            )));
        }

        let escrow_id = format!("escrow-{}", Uuid::new_v4().simple());
        self.escrows.write().await.insert(
            escrow_id.clone(),
            LedgerEscrow {
                request: request.clone(),
                status: EscrowStatus::Active,
                transaction_ref: None,
            },
        );
        Ok(escrow_id)
    }

    async fn release_escrow(&self, escrow_id: &str) -> CollaboratorResult<String> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("ledger release timed out upstream".to_string()));
        }

        let mut escrows = self.escrows.write().await;
        let escrow = escrows
            .get_mut(escrow_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("escrow {escrow_id}")))?;
        if escrow.status != EscrowStatus::Active {
            return Err(CollaboratorError::Rejected(format!(
                "escrow {escrow_id} is {}",
                escrow.status.as_str()
            )));
        }

        let transaction_ref = format!("tx-{}", Uuid::new_v4().simple());
        escrow.status = EscrowStatus::Released;
        escrow.transaction_ref = Some(transaction_ref.clone());
        Ok(transaction_ref)
    }

    async fn get_status(&self, escrow_id: &str) -> CollaboratorResult<EscrowStatus> {
        self.escrows
            .read()
            .await
            .get(escrow_id)
            .map(|e| e.status)
            .ok_or_else(|| CollaboratorError::NotFound(format!("escrow {escrow_id}")))
    }
}
