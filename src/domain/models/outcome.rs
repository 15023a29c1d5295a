use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::thresholds::StageKind;

/// How a threshold decision turned out once the job progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Outcome not yet known.
    Pending,
    /// Decision was borne out downstream.
    Succeeded,
    /// Decision turned out wrong downstream.
    Failed,
}

/// One matching or validation decision with its eventual outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub stage: StageKind,
    pub job_id: Uuid,
    /// Score the decision was made on.
    pub score: f64,
    /// Threshold in force at decision time.
    pub threshold: f64,
    /// Whether the score cleared the threshold.
    pub accepted: bool,
    pub resolution: Resolution,
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(stage: StageKind, job_id: Uuid, score: f64, threshold: f64, accepted: bool) -> Self {
        Self {
            stage,
            job_id,
            score,
            threshold,
            accepted,
            resolution: Resolution::Pending,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn resolved(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Pending
    }

    /// Accepted, but the job later failed.
    pub fn is_false_positive(&self) -> bool {
        self.accepted && self.resolution == Resolution::Failed
    }

    /// Rejected, and the rejection cost the job.
    pub fn is_false_negative(&self) -> bool {
        !self.accepted && self.resolution == Resolution::Failed
    }
}
