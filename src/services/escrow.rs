//! Escrow and payment stage.
//!
//! Keeps a cached [`EscrowRecord`] per job in front of the [`Ledger`]. Creation
//! is idempotent per job. Release is requested from the ledger at most once per
//! job: the cached status flips to `Released` before the ledger call, and a
//! record that is not `Active` never reaches the ledger again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{CollaboratorError, CollaboratorResult};
use crate::domain::models::escrow::HELD_FOR_QA;
use crate::domain::models::{EscrowRecord, EscrowStatus, Job, PaymentRelease, StageKind};
use crate::domain::ports::{EscrowRequest, Ledger};
use crate::services::collaborator::call_with_timeout;

pub struct EscrowService {
    ledger: Arc<dyn Ledger>,
    records: RwLock<HashMap<Uuid, EscrowRecord>>,
    timeout: Duration,
}

impl EscrowService {
    pub fn new(ledger: Arc<dyn Ledger>, timeout: Duration) -> Self {
        Self {
            ledger,
            records: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Open an escrow for the job's agreed rate, or return the existing one.
    ///
    /// Callers serialize creation per job.
    pub async fn create_escrow(&self, job: &Job) -> CollaboratorResult<EscrowRecord> {
        if let Some(existing) = self.records.read().await.get(&job.id) {
            tracing::debug!(job_id = %job.id, escrow_id = %existing.escrow_id, "escrow already exists");
            return Ok(existing.clone());
        }

        let (Some(payee), Some(amount)) = (job.counterparty_id.clone(), job.agreed_rate) else {
            return Err(CollaboratorError::Rejected(
                "job has no counterparty or agreed rate".to_string(),
            ));
        };

        let request = EscrowRequest {
            payer: job.spec.requester_id.clone(),
            payee,
            amount,
            job_id: job.id,
        };
        let ledger = self.ledger.clone();
        let escrow_id = call_with_timeout(StageKind::Escrow, self.timeout, async move {
            ledger.create_escrow(&request).await
        })
        .await?;

        let record = EscrowRecord {
            escrow_id,
            job_id: job.id,
            amount,
            status: EscrowStatus::Active,
            created_at: Utc::now(),
            released_at: None,
        };

        let mut records = self.records.write().await;
        let stored = records.entry(job.id).or_insert(record).clone();
        tracing::info!(job_id = %job.id, escrow_id = %stored.escrow_id, amount, "escrow created");
        Ok(stored)
    }

    /// Release the job's escrow if the cached status is `Active` and the
    /// latest validation passed; otherwise return a held result without
    /// touching the ledger.
    ///
    /// A ledger failure is returned as an error and the cached status stays
    /// `Released`, so no second release is ever requested for the job.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn release_payment(&self, job: &Job) -> CollaboratorResult<PaymentRelease> {
        let validated = job.last_validation.as_ref().is_some_and(|v| v.passed);

        let record = {
            let mut records = self.records.write().await;
            let Some(record) = records.get_mut(&job.id) else {
                return Err(CollaboratorError::NotFound(format!("no escrow for job {}", job.id)));
            };
            if !validated {
                tracing::info!(escrow_id = %record.escrow_id, "payment held pending validation");
                return Ok(PaymentRelease::held(record, HELD_FOR_QA));
            }
            if record.status != EscrowStatus::Active {
                tracing::warn!(
                    escrow_id = %record.escrow_id,
                    status = record.status.as_str(),
                    "release skipped, escrow is not active"
                );
                return Ok(PaymentRelease::held(
                    record,
                    format!("Escrow is {}", record.status.as_str()),
                ));
            }
            record.status = EscrowStatus::Released;
            record.released_at = Some(Utc::now());
            record.clone()
        };

        let ledger = self.ledger.clone();
        let escrow_id = record.escrow_id.clone();
        match call_with_timeout(StageKind::Escrow, self.timeout, async move {
            ledger.release_escrow(&escrow_id).await
        })
        .await
        {
            Ok(transaction_ref) => {
                tracing::info!(
                    escrow_id = %record.escrow_id,
                    transaction_ref = %transaction_ref,
                    amount = record.amount,
                    "payment released"
                );
                Ok(PaymentRelease::released(&record, transaction_ref))
            }
            Err(e) => {
                tracing::error!(escrow_id = %record.escrow_id, error = %e, "ledger release failed");
                Err(e)
            }
        }
    }

    /// Update the cached status from the ledger.
    ///
    /// A ledger report of `Active` for an escrow already cached as released
    /// is logged and ignored; the cache never re-opens a release.
    pub async fn refresh(&self, job_id: Uuid) -> CollaboratorResult<EscrowRecord> {
        let escrow_id = self
            .records
            .read()
            .await
            .get(&job_id)
            .map(|r| r.escrow_id.clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("no escrow for job {job_id}")))?;

        let ledger = self.ledger.clone();
        let id = escrow_id.clone();
        let status = call_with_timeout(StageKind::Escrow, self.timeout, async move {
            ledger.get_status(&id).await
        })
        .await?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&job_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("no escrow for job {job_id}")))?;
        match (record.status, status) {
            (EscrowStatus::Active, EscrowStatus::Active) => {}
            (EscrowStatus::Active, next) => {
                record.status = next;
                record.released_at.get_or_insert_with(Utc::now);
            }
            (cached, EscrowStatus::Active) => {
                tracing::warn!(
                    %escrow_id,
                    cached = cached.as_str(),
                    "ledger reports active escrow after release was requested"
                );
            }
            (_, next) => record.status = next,
        }
        Ok(record.clone())
    }

    /// Cached record for a job.
    pub async fn record(&self, job_id: Uuid) -> Option<EscrowRecord> {
        self.records.read().await.get(&job_id).cloned()
    }
}
