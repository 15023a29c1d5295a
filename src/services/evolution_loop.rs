//! Evolution loop for adaptive stage thresholds.
//!
//! Each run reads a bounded window of resolved outcomes per adaptive stage,
//! measures how often the threshold let a bad decision through (false
//! positive) or turned away a good one (false negative), and nudges the
//! threshold against the dominant error. Runs never overlap; a run requested
//! while another is in progress is skipped and reported.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::models::{EvolutionConfig, OutcomeRecord, Resolution, StageKind, StageThresholds};
use crate::services::outcome_history::OutcomeHistory;
use crate::services::threshold_store::ThresholdStore;

/// Reports kept for inspection.
const REPORT_HISTORY: usize = 50;

/// Outcome statistics for one stage over the evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub stage: StageKind,
    /// Records in the window, resolved or not.
    pub samples: usize,
    /// Records with a known outcome.
    pub resolved: usize,
    pub successes: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub success_rate: f64,
    pub false_positive_rate: f64,
    pub false_negative_rate: f64,
}

impl StageStats {
    pub fn from_records(stage: StageKind, records: &[OutcomeRecord]) -> Self {
        let samples = records.len();
        let resolved: Vec<&OutcomeRecord> = records.iter().filter(|r| r.is_resolved()).collect();
        let successes = resolved
            .iter()
            .filter(|r| r.resolution == Resolution::Succeeded)
            .count();
        let false_positives = resolved.iter().filter(|r| r.is_false_positive()).count();
        let false_negatives = resolved.iter().filter(|r| r.is_false_negative()).count();

        let rate = |n: usize| {
            if resolved.is_empty() {
                0.0
            } else {
                n as f64 / resolved.len() as f64
            }
        };

        Self {
            stage,
            samples,
            resolved: resolved.len(),
            successes,
            false_positives,
            false_negatives,
            success_rate: rate(successes),
            false_positive_rate: rate(false_positives),
            false_negative_rate: rate(false_negatives),
        }
    }
}

/// Action taken for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvolutionAction {
    /// Threshold raised to cut false positives.
    Raised { from: f64, to: f64 },
    /// Threshold lowered to cut false negatives.
    Lowered { from: f64, to: f64 },
    /// No change (informational).
    NoAction { reason: String },
}

impl EvolutionAction {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoAction { .. })
    }
}

/// Evaluation of one stage in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvaluation {
    pub stage: StageKind,
    pub stats: StageStats,
    pub action: EvolutionAction,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    pub id: Uuid,
    pub evaluations: Vec<StageEvaluation>,
    /// Snapshot in force after the run.
    pub thresholds: StageThresholds,
    pub completed_at: DateTime<Utc>,
}

impl EvolutionReport {
    pub fn adjustments(&self) -> usize {
        self.evaluations.iter().filter(|e| e.action.is_change()).count()
    }
}

/// Result of asking the loop to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvolutionRun {
    Completed(EvolutionReport),
    Skipped { reason: String },
}

/// Decide the action for one stage.
///
/// Pure: `current` is the stage's threshold, the returned action carries the
/// clamped new value when it changes.
pub fn decide(stats: &StageStats, current: f64, snapshot: &StageThresholds, config: &EvolutionConfig) -> EvolutionAction {
    if stats.resolved < config.min_samples {
        return EvolutionAction::NoAction {
            reason: format!(
                "Insufficient samples: {} resolved outcomes, {} required",
                stats.resolved, config.min_samples
            ),
        };
    }

    let fp = stats.false_positive_rate;
    let fnr = stats.false_negative_rate;

    let target = if fp > fnr && fp > config.error_tolerance {
        current + config.raise_step
    } else if fnr > fp && fnr > config.error_tolerance {
        current - config.lower_step
    } else {
        return EvolutionAction::NoAction {
            reason: format!(
                "Error rates within tolerance (false positives {fp:.2}, false negatives {fnr:.2})"
            ),
        };
    };

    let to = snapshot.bounds.clamp(target);
    if (to - current).abs() < f64::EPSILON {
        return EvolutionAction::NoAction {
            reason: format!("Threshold already at bound ({current:.2})"),
        };
    }

    if to > current {
        EvolutionAction::Raised { from: current, to }
    } else {
        EvolutionAction::Lowered { from: current, to }
    }
}

/// Evolution loop service.
pub struct EvolutionLoop {
    config: EvolutionConfig,
    thresholds: Arc<ThresholdStore>,
    history: Arc<OutcomeHistory>,
    run_guard: Mutex<()>,
    reports: RwLock<VecDeque<EvolutionReport>>,
}

impl EvolutionLoop {
    pub fn new(config: EvolutionConfig, thresholds: Arc<ThresholdStore>, history: Arc<OutcomeHistory>) -> Self {
        Self {
            config,
            thresholds,
            history,
            run_guard: Mutex::new(()),
            reports: RwLock::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Run one evaluation pass, or skip if a pass is already running.
    pub async fn run(&self) -> EvolutionRun {
        let Ok(_guard) = self.run_guard.try_lock() else {
            tracing::warn!("evolution run skipped, previous run still in progress");
            return EvolutionRun::Skipped {
                reason: "Evolution run already in progress".to_string(),
            };
        };

        let report = self.evaluate().await;
        tracing::info!(
            report_id = %report.id,
            adjustments = report.adjustments(),
            matching = report.thresholds.matching_confidence,
            validation = report.thresholds.validation_similarity,
            "evolution run completed"
        );

        let mut reports = self.reports.write().await;
        if reports.len() == REPORT_HISTORY {
            reports.pop_front();
        }
        reports.push_back(report.clone());
        EvolutionRun::Completed(report)
    }

    async fn evaluate(&self) -> EvolutionReport {
        let snapshot = self.thresholds.current().await;
        let mut next = (*snapshot).clone();
        let mut evaluations = Vec::with_capacity(StageKind::ADAPTIVE.len());

        for stage in StageKind::ADAPTIVE {
            let window = self
                .history
                .window(stage, self.config.window_size, self.config.window_days)
                .await;
            let stats = StageStats::from_records(stage, &window);
            let current = snapshot.get(stage).unwrap_or_default();
            let action = decide(&stats, current, &snapshot, &self.config);

            match &action {
                EvolutionAction::Raised { from, to } | EvolutionAction::Lowered { from, to } => {
                    tracing::info!(
                        stage = %stage,
                        from,
                        to,
                        false_positive_rate = stats.false_positive_rate,
                        false_negative_rate = stats.false_negative_rate,
                        "threshold adjusted"
                    );
                    next = next.with_value(stage, *to);
                }
                EvolutionAction::NoAction { reason } => {
                    tracing::debug!(stage = %stage, %reason, "threshold unchanged");
                }
            }

            evaluations.push(StageEvaluation { stage, stats, action });
        }

        if next.version != snapshot.version {
            self.thresholds.replace(next.clone()).await;
        }

        EvolutionReport {
            id: Uuid::new_v4(),
            evaluations,
            thresholds: next,
            completed_at: Utc::now(),
        }
    }

    /// Most recent completed report.
    pub async fn last_report(&self) -> Option<EvolutionReport> {
        self.reports.read().await.back().cloned()
    }

    /// Completed reports, oldest first.
    pub async fn reports(&self) -> Vec<EvolutionReport> {
        self.reports.read().await.iter().cloned().collect()
    }
}
