//! Job orchestrator: drives each job through its state machine.
//!
//! Every job lives behind its own async mutex, so operations on one job
//! serialize while different jobs proceed independently. The job map lock is
//! only held long enough to look up or insert a handle. Each job also
//! publishes a snapshot whenever its lock is released, which listings and
//! metrics read without waiting on in-flight stages.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::errors::{CollaboratorError, DomainError, DomainResult};
use crate::domain::models::{
    Config, EscrowRecord, EscrowStatus, Job, JobSpec, JobState, NegotiationParams, OutcomeRecord,
    PaymentRelease, Resolution, StageKind, ValidationResult,
};
use crate::domain::ports::{ArtifactStore, CounterpartyDirectory, EmbeddingProvider, Ledger, SearchIndex};
use crate::services::escrow::EscrowService;
use crate::services::evolution_loop::{EvolutionLoop, EvolutionRun};
use crate::services::matching::MatchingService;
use crate::services::metrics::PerformanceMetrics;
use crate::services::negotiation::negotiate;
use crate::services::outcome_history::OutcomeHistory;
use crate::services::quality::QualityService;
use crate::services::threshold_store::ThresholdStore;

/// External collaborators the orchestrator calls through.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchIndex>,
    pub directory: Arc<dyn CounterpartyDirectory>,
    pub ledger: Arc<dyn Ledger>,
    pub storage: Arc<dyn ArtifactStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Where `submit_job` stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Escrow funded; the job is `Active`.
    Active,
    /// Nobody cleared the matching threshold, or the search failed. The job stays `Posted`.
    NoMatches { reason: String },
    /// Bracket convergence gave up. The job stays `Negotiating`.
    NegotiationFailed { rounds: u32 },
    /// The ledger refused or did not answer. The job stays `Negotiating`.
    EscrowFailed { reason: String },
}

impl PipelineOutcome {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// The stage failure as an error, for callers that prefer `?`.
    pub fn into_error(self, job_id: Uuid) -> Option<DomainError> {
        match self {
            Self::Active => None,
            Self::NoMatches { .. } => Some(DomainError::NoMatches { job_id }),
            Self::NegotiationFailed { rounds } => Some(DomainError::NegotiationFailed { job_id, rounds }),
            Self::EscrowFailed { reason } => Some(DomainError::EscrowFailed { job_id, reason }),
        }
    }
}

/// Result of `submit_job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub job: Job,
    pub outcome: PipelineOutcome,
}

/// Result of `submit_artifact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReview {
    pub job: Job,
    pub validation: ValidationResult,
    /// Present when a release was attempted.
    pub payment: Option<PaymentRelease>,
}

/// A job's lock plus the last state published when the lock was released.
struct JobSlot {
    job: Arc<Mutex<Job>>,
    published: watch::Sender<Job>,
}

impl JobSlot {
    fn new(job: Job) -> Self {
        let (published, _) = watch::channel(job.clone());
        Self {
            job: Arc::new(Mutex::new(job)),
            published,
        }
    }

    async fn lock(self: Arc<Self>) -> JobGuard {
        let job = self.job.clone().lock_owned().await;
        JobGuard { job, slot: self }
    }

    fn snapshot(&self) -> Job {
        self.published.borrow().clone()
    }
}

/// Exclusive access to a job. Publishes the job's state on drop.
struct JobGuard {
    job: OwnedMutexGuard<Job>,
    slot: Arc<JobSlot>,
}

impl Deref for JobGuard {
    type Target = Job;

    fn deref(&self) -> &Job {
        &self.job
    }
}

impl DerefMut for JobGuard {
    fn deref_mut(&mut self) -> &mut Job {
        &mut self.job
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.slot.published.send_replace(self.job.clone());
    }
}

pub struct JobOrchestrator {
    jobs: RwLock<HashMap<Uuid, Arc<JobSlot>>>,
    thresholds: Arc<ThresholdStore>,
    history: Arc<OutcomeHistory>,
    evolution: Arc<EvolutionLoop>,
    matching: MatchingService,
    quality: QualityService,
    escrow: EscrowService,
    negotiation: NegotiationParams,
    /// How far below the matching threshold a best score may fall and still
    /// count as a rejection worth learning from.
    near_miss_margin: f64,
}

impl JobOrchestrator {
    pub fn new(collaborators: Collaborators, config: &Config) -> Self {
        let thresholds = Arc::new(ThresholdStore::new(config.thresholds.initial()));
        let history = Arc::new(OutcomeHistory::new());
        let evolution = Arc::new(EvolutionLoop::new(
            config.evolution.clone(),
            thresholds.clone(),
            history.clone(),
        ));
        let timeout = config.collaborators.timeout();

        Self {
            jobs: RwLock::new(HashMap::new()),
            matching: MatchingService::new(
                collaborators.search,
                collaborators.directory,
                config.matching.candidate_limit,
                timeout,
            ),
            quality: QualityService::new(collaborators.storage, collaborators.embedder, timeout),
            escrow: EscrowService::new(collaborators.ledger, timeout),
            negotiation: config.negotiation.params(),
            near_miss_margin: config.evolution.lower_step,
            thresholds,
            history,
            evolution,
        }
    }

    pub fn thresholds(&self) -> Arc<ThresholdStore> {
        self.thresholds.clone()
    }

    pub fn history(&self) -> Arc<OutcomeHistory> {
        self.history.clone()
    }

    pub fn evolution(&self) -> Arc<EvolutionLoop> {
        self.evolution.clone()
    }

    async fn handle(&self, job_id: Uuid) -> DomainResult<Arc<JobSlot>> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(DomainError::NotFound(job_id))
    }

    /// Post a job and run matching, negotiation, and escrow creation.
    ///
    /// Only an invalid spec is an error; stage failures come back as the
    /// [`PipelineOutcome`] with the job left in its last reached state.
    #[tracing::instrument(skip(self, spec), fields(title = %spec.title))]
    pub async fn submit_job(&self, spec: JobSpec) -> DomainResult<JobSubmission> {
        spec.validate().map_err(DomainError::InvalidSpec)?;

        let job = Job::new(spec);
        let job_id = job.id;
        let slot = Arc::new(JobSlot::new(job));
        // Lock before inserting so no other call observes the job mid-pipeline.
        let mut job = slot.clone().lock().await;
        self.jobs.write().await.insert(job_id, slot);
        tracing::info!(%job_id, "job posted");

        let outcome = self.run_pipeline(&mut job).await?;
        tracing::info!(%job_id, state = %job.state, ?outcome, "submission pipeline finished");

        Ok(JobSubmission {
            job: job.clone(),
            outcome,
        })
    }

    async fn run_pipeline(&self, job: &mut Job) -> DomainResult<PipelineOutcome> {
        let thresholds = self.thresholds.current().await;
        let threshold = thresholds.matching_confidence;

        // Matching
        let result = match self.matching.find_candidates(&job.spec, threshold).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(job_id = %job.id, stage = "matching", error = %e, "search failed");
                job.last_match_attempt = Some(chrono::Utc::now());
                return Ok(PipelineOutcome::NoMatches {
                    reason: format!("Search unavailable: {e}"),
                });
            }
        };

        let Some(best) = result.best().cloned() else {
            job.mark_unmatchable();
            // Only a near miss says anything about the threshold; a poor pool does not.
            if let Some(top) = result.top_score.filter(|top| *top >= threshold - self.near_miss_margin) {
                self.history
                    .record(
                        OutcomeRecord::new(StageKind::Matching, job.id, top, threshold, false)
                            .resolved(Resolution::Failed),
                    )
                    .await;
            }
            tracing::info!(job_id = %job.id, threshold, top_score = ?result.top_score, "no counterparty met the threshold");
            return Ok(PipelineOutcome::NoMatches {
                reason: format!("No counterparty scored at or above {threshold:.2}"),
            });
        };

        let (matched, profile) = self.matching.describe(&job.spec, &best).await;
        job.assign_counterparty(matched.counterparty_id.clone(), matched.confidence, matched.reasons);
        advance(job, JobState::Matched, "match")?;
        self.history
            .record(OutcomeRecord::new(
                StageKind::Matching,
                job.id,
                matched.confidence,
                threshold,
                true,
            ))
            .await;
        tracing::info!(
            job_id = %job.id,
            counterparty_id = %matched.counterparty_id,
            score = matched.confidence,
            threshold,
            "counterparty matched"
        );

        // Negotiation
        advance(job, JobState::Negotiating, "negotiate")?;
        let ask = profile
            .and_then(|p| p.hourly_rate)
            .unwrap_or(job.spec.budget.max);
        let negotiated = negotiate(job.spec.budget, ask, &self.negotiation);
        job.record_negotiation(negotiated.rounds, negotiated.rate);

        let Some(rate) = negotiated.rate else {
            self.history.resolve(job.id, StageKind::Matching, Resolution::Failed).await;
            tracing::info!(
                job_id = %job.id,
                ask,
                budget_max = job.spec.budget.max,
                rounds = negotiated.rounds,
                "negotiation did not converge"
            );
            return Ok(PipelineOutcome::NegotiationFailed {
                rounds: negotiated.rounds,
            });
        };
        tracing::info!(job_id = %job.id, rate, rounds = negotiated.rounds, "rate agreed");

        // Escrow
        let record = match self.escrow.create_escrow(job).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(job_id = %job.id, stage = "escrow", error = %e, "escrow creation failed");
                return Ok(PipelineOutcome::EscrowFailed { reason: e.to_string() });
            }
        };
        job.attach_escrow(record);
        advance(job, JobState::Active, "activate")?;
        tracing::info!(job_id = %job.id, state = %job.state, "job active");

        Ok(PipelineOutcome::Active)
    }

    /// Deliver an artifact and validate it; release payment on a pass.
    ///
    /// Valid from `Active`, and from `InQA` to resubmit after a rejection.
    #[tracing::instrument(skip(self, artifact), fields(bytes = artifact.len()))]
    pub async fn submit_artifact(&self, job_id: Uuid, artifact: Vec<u8>) -> DomainResult<ArtifactReview> {
        let mut job = self.handle(job_id).await?.lock().await;

        match job.state {
            JobState::Active => advance(&mut job, JobState::InQA, "submit an artifact for")?,
            JobState::InQA => {}
            from => {
                return Err(DomainError::InvalidTransition {
                    job_id,
                    from,
                    operation: "submit an artifact for",
                })
            }
        }

        let artifact_ref = match self.quality.store_artifact(artifact).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "artifact storage failed");
                None
            }
        };

        let threshold = self.thresholds.current().await.validation_similarity;
        let requirements = job.spec.requirements_text();
        let validation = self
            .quality
            .validate(job_id, &requirements, artifact_ref.as_deref(), threshold)
            .await;
        job.record_validation(validation.clone());

        if validation.evaluated {
            if validation.passed {
                // Earlier rejections were right: revised work got through.
                self.history
                    .resolve(job_id, StageKind::Validation, Resolution::Succeeded)
                    .await;
            }
            self.history
                .record(OutcomeRecord::new(
                    StageKind::Validation,
                    job_id,
                    validation.similarity,
                    threshold,
                    validation.passed,
                ))
                .await;
        }

        if !validation.passed {
            tracing::info!(%job_id, score = validation.similarity, threshold, "artifact rejected");
            return Ok(ArtifactReview {
                job: job.clone(),
                validation,
                payment: None,
            });
        }

        let release = self
            .escrow
            .release_payment(&job)
            .await
            .map_err(|e| DomainError::EscrowFailed {
                job_id,
                reason: e.to_string(),
            });
        if let Some(record) = self.escrow.record(job_id).await {
            job.attach_escrow(record);
        }
        let release = release?;

        if let Some(ref transaction_ref) = release.transaction_ref {
            job.record_payment(transaction_ref.clone());
            advance(&mut job, JobState::Completed, "complete")?;
            self.history.resolve_job(job_id, Resolution::Succeeded).await;
            tracing::info!(%job_id, amount = release.amount, "job completed");
        }

        Ok(ArtifactReview {
            job: job.clone(),
            validation,
            payment: Some(release),
        })
    }

    /// Read-only snapshot of a job.
    pub async fn get_job(&self, job_id: Uuid) -> DomainResult<Job> {
        let job = self.handle(job_id).await?.lock().await;
        Ok(job.clone())
    }

    /// Last published snapshot of every job.
    ///
    /// Does not wait for in-flight operations; a job mid-stage shows the state
    /// it had when its previous operation finished.
    pub async fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().map(|slot| slot.snapshot()).collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Cancel a job that holds no funds yet.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: Uuid) -> DomainResult<Job> {
        let mut job = self.handle(job_id).await?.lock().await;

        if !job.state.is_pre_funding() {
            return Err(DomainError::InvalidTransition {
                job_id,
                from: job.state,
                operation: "cancel",
            });
        }
        advance(&mut job, JobState::Cancelled, "cancel")?;
        self.history.resolve_job(job_id, Resolution::Failed).await;
        tracing::info!(%job_id, "job cancelled");
        Ok(job.clone())
    }

    /// Divert a non-terminal job into dispute resolution. Escrow is not released.
    #[tracing::instrument(skip(self, reason))]
    pub async fn dispute_job(&self, job_id: Uuid, reason: impl Into<String>) -> DomainResult<Job> {
        let mut job = self.handle(job_id).await?.lock().await;

        if job.is_terminal() {
            return Err(DomainError::InvalidTransition {
                job_id,
                from: job.state,
                operation: "dispute",
            });
        }
        job.dispute_reason = Some(reason.into());
        advance(&mut job, JobState::Disputed, "dispute")?;
        self.history.resolve_job(job_id, Resolution::Failed).await;
        tracing::info!(%job_id, reason = ?job.dispute_reason, "job disputed");
        Ok(job.clone())
    }

    /// Refresh the cached escrow status from the ledger.
    ///
    /// If the ledger confirms a release the job was waiting on, the job
    /// completes with the escrow id as its payment reference.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_escrow(&self, job_id: Uuid) -> DomainResult<EscrowRecord> {
        let mut job = self.handle(job_id).await?.lock().await;

        let record = self
            .escrow
            .refresh(job_id)
            .await
            .map_err(|e| match e {
                CollaboratorError::NotFound(_) => DomainError::NotFound(job_id),
                e => DomainError::EscrowFailed {
                    job_id,
                    reason: e.to_string(),
                },
            })?;
        job.attach_escrow(record.clone());

        let awaiting_release = job.state == JobState::InQA
            && job.payment_ref.is_none()
            && job.last_validation.as_ref().is_some_and(|v| v.passed);
        if awaiting_release && record.status == EscrowStatus::Released {
            job.record_payment(record.escrow_id.clone());
            advance(&mut job, JobState::Completed, "complete")?;
            self.history.resolve_job(job_id, Resolution::Succeeded).await;
            tracing::info!(%job_id, escrow_id = %record.escrow_id, "ledger confirmed release, job completed");
        }
        Ok(record)
    }

    /// Aggregate figures over every job.
    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        let jobs = self.list_jobs().await;
        let thresholds = (*self.thresholds.current().await).clone();
        PerformanceMetrics::compute(&jobs, thresholds)
    }

    /// Run the evolution loop now. Skipped if a run is already in progress.
    pub async fn trigger_evolution(&self) -> EvolutionRun {
        self.evolution.run().await
    }
}

fn advance(job: &mut Job, next: JobState, operation: &'static str) -> DomainResult<()> {
    let (job_id, from) = (job.id, job.state);
    job.transition_to(next).map_err(|reason| {
        tracing::error!(%job_id, %from, to = %next, %reason, "transition refused");
        DomainError::InvalidTransition {
            job_id,
            from,
            operation,
        }
    })?;
    tracing::debug!(%job_id, %from, to = %next, "state transition");
    Ok(())
}
