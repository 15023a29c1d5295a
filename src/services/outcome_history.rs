//! Append-only log of stage decisions and how they turned out.
//!
//! The orchestrator records every matching and validation decision, then
//! resolves it once the job reaches an outcome. The evolution loop reads
//! resolved records to compute false-positive and false-negative rates.

use std::collections::VecDeque;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::{OutcomeRecord, Resolution, StageKind};

/// Oldest records are dropped past this many entries.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct OutcomeHistory {
    records: RwLock<VecDeque<OutcomeRecord>>,
    capacity: usize,
}

impl OutcomeHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a decision.
    pub async fn record(&self, record: OutcomeRecord) {
        let mut records = self.records.write().await;
        if records.len() == self.capacity {
            records.pop_front();
        }
        tracing::debug!(
            job_id = %record.job_id,
            stage = %record.stage,
            score = record.score,
            threshold = record.threshold,
            accepted = record.accepted,
            "outcome recorded"
        );
        records.push_back(record);
    }

    /// Resolve every pending record of `stage` for `job_id`. Returns how many changed.
    pub async fn resolve(&self, job_id: Uuid, stage: StageKind, resolution: Resolution) -> usize {
        let mut records = self.records.write().await;
        let mut changed = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.job_id == job_id && r.stage == stage && !r.is_resolved())
        {
            record.resolution = resolution;
            changed += 1;
        }
        changed
    }

    /// Resolve every pending record for `job_id`, whatever the stage.
    pub async fn resolve_job(&self, job_id: Uuid, resolution: Resolution) -> usize {
        let mut changed = 0;
        for stage in StageKind::ADAPTIVE {
            changed += self.resolve(job_id, stage, resolution).await;
        }
        changed
    }

    /// Most recent records for `stage`, newest first: at most `size` of them and
    /// none older than `max_age_days`.
    pub async fn window(&self, stage: StageKind, size: usize, max_age_days: i64) -> Vec<OutcomeRecord> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        self.records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.stage == stage && r.recorded_at >= cutoff)
            .take(size)
            .cloned()
            .collect()
    }

    /// All records for a job, oldest first.
    pub async fn for_job(&self, job_id: Uuid) -> Vec<OutcomeRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for OutcomeHistory {
    fn default() -> Self {
        Self::new()
    }
}
