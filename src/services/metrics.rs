//! Aggregate performance figures over all jobs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Job, JobState, StageThresholds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_jobs: usize,
    /// Count per state, keyed by state name.
    pub jobs_by_state: BTreeMap<String, usize>,
    /// Share of jobs that ever reached `Matched`.
    pub match_rate: f64,
    /// Share of jobs that reached `Completed`.
    pub completion_rate: f64,
    /// Mean similarity of each job's latest evaluated validation.
    pub avg_validation_score: f64,
    /// Jobs in `Active` or `InQA`.
    pub active_jobs: usize,
    /// Share of negotiations that reached agreement.
    pub negotiation_success_rate: f64,
    /// Jobs whose payment the ledger confirmed.
    pub payments_released: usize,
    pub thresholds: StageThresholds,
}

impl PerformanceMetrics {
    pub fn compute(jobs: &[Job], thresholds: StageThresholds) -> Self {
        let total = jobs.len();

        let mut jobs_by_state = BTreeMap::new();
        for state in JobState::ALL {
            jobs_by_state.insert(state.as_str().to_string(), 0);
        }
        for job in jobs {
            *jobs_by_state.entry(job.state.as_str().to_string()).or_insert(0) += 1;
        }

        let matched = jobs
            .iter()
            .filter(|j| j.history.iter().any(|c| c.state == JobState::Matched))
            .count();
        let completed = jobs.iter().filter(|j| j.state == JobState::Completed).count();
        let active_jobs = jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Active | JobState::InQA))
            .count();

        let scores: Vec<f64> = jobs
            .iter()
            .filter_map(|j| j.last_validation.as_ref())
            .filter(|v| v.evaluated)
            .map(|v| v.similarity)
            .collect();

        let negotiated = jobs.iter().filter(|j| j.negotiation_rounds.is_some()).count();
        let agreed = jobs
            .iter()
            .filter(|j| j.negotiation_rounds.is_some() && j.agreed_rate.is_some())
            .count();
        let payments_released = jobs.iter().filter(|j| j.payment_ref.is_some()).count();

        Self {
            total_jobs: total,
            jobs_by_state,
            match_rate: ratio(matched, total),
            completion_rate: ratio(completed, total),
            avg_validation_score: if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            },
            active_jobs,
            negotiation_success_rate: ratio(agreed, negotiated),
            payments_released,
            thresholds,
        }
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}
