//! Implementation of the `gignova simulate` command.
//!
//! A scenario file lists counterparties and jobs. Each job is posted, and its
//! artifacts are submitted in order until one is accepted. Everything runs
//! against the in-memory collaborators.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::embeddings;
use crate::adapters::memory::{InMemoryArtifactStore, InMemoryDirectory, InMemoryLedger, InMemorySearchIndex};
use crate::cli::output::{list_table, or_dash, output, style_state, truncate, CommandOutput};
use crate::domain::models::{Budget, Config, CounterpartyProfile, JobSpec, JobState};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{Collaborators, EvolutionRun, JobOrchestrator, PerformanceMetrics, PipelineOutcome};

const DEFAULT_DEADLINE_DAYS: i64 = 7;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Scenario YAML file
    pub scenario: PathBuf,

    /// Run one evolution pass after all jobs are processed
    #[arg(long)]
    pub evolve: bool,
}

/// Scenario file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub counterparties: Vec<CounterpartyProfile>,
    #[serde(default)]
    pub jobs: Vec<ScenarioJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioJob {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub budget: Budget,
    #[serde(default = "default_requester")]
    pub requester_id: String,
    /// Absolute deadline; defaults to a week from now.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Deliverables submitted in order until one passes.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Dispute the job with this reason after its artifacts are processed.
    #[serde(default)]
    pub dispute: Option<String>,
}

fn default_requester() -> String {
    "requester".to_string()
}

impl ScenarioJob {
    fn to_spec(&self, now: DateTime<Utc>) -> JobSpec {
        JobSpec {
            title: self.title.clone(),
            description: self.description.clone(),
            skills: self.skills.clone(),
            requirements: self.requirements.clone(),
            budget: self.budget,
            deadline: self
                .deadline
                .unwrap_or_else(|| now + Duration::days(DEFAULT_DEADLINE_DAYS)),
            requester_id: self.requester_id.clone(),
        }
    }
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse scenario {}", path.display()))
    }
}

/// What happened to one scenario job.
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub title: String,
    pub state: JobState,
    pub outcome: PipelineOutcome,
    pub counterparty_id: Option<String>,
    pub agreed_rate: Option<f64>,
    pub negotiation_rounds: Option<u32>,
    /// Similarity of each evaluated submission, in order.
    pub similarities: Vec<f64>,
    pub payment_ref: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimulationOutput {
    pub jobs: Vec<JobReport>,
    pub metrics: PerformanceMetrics,
    pub evolution: Option<EvolutionRun>,
}

impl CommandOutput for SimulationOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["title", "state", "counterparty", "rate", "rounds", "qa", "payment"]);
        for job in &self.jobs {
            let qa = job
                .similarities
                .iter()
                .map(|s| format!("{s:.2}"))
                .collect::<Vec<_>>()
                .join(" ");
            table.add_row(vec![
                truncate(&job.title, 32),
                style_state(job.state.as_str()).to_string(),
                or_dash(job.counterparty_id.as_deref()),
                or_dash(job.agreed_rate.map(|r| format!("{r:.2}"))),
                or_dash(job.negotiation_rounds),
                if qa.is_empty() { "-".to_string() } else { qa },
                or_dash(job.payment_ref.as_deref()),
            ]);
        }

        let m = &self.metrics;
        let mut lines = vec![
            format!("{} job(s):", console::style(self.jobs.len()).bold()),
            table.to_string(),
            String::new(),
            format!(
                "match rate {:.0}%  completion {:.0}%  negotiation success {:.0}%  avg QA {:.2}  payments {}",
                m.match_rate * 100.0,
                m.completion_rate * 100.0,
                m.negotiation_success_rate * 100.0,
                m.avg_validation_score,
                m.payments_released,
            ),
            format!(
                "thresholds: matching {:.2}  validation {:.2} (v{})",
                m.thresholds.matching_confidence, m.thresholds.validation_similarity, m.thresholds.version,
            ),
        ];

        for job in self.jobs.iter().filter(|j| j.error.is_some()) {
            lines.push(format!("{}: {}", job.title, or_dash(job.error.as_deref())));
        }

        match &self.evolution {
            Some(EvolutionRun::Completed(report)) => {
                lines.push(format!("evolution: {} adjustment(s)", report.adjustments()));
                for eval in &report.evaluations {
                    lines.push(format!("  {}: {:?}", eval.stage.as_str(), eval.action));
                }
            }
            Some(EvolutionRun::Skipped { reason }) => lines.push(format!("evolution skipped: {reason}")),
            None => {}
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Build an orchestrator backed by in-memory collaborators seeded with `counterparties`.
pub async fn local_orchestrator(config: &Config, counterparties: &[CounterpartyProfile]) -> Result<JobOrchestrator> {
    let embedder = embeddings::from_config(&config.embeddings)?;
    let search = Arc::new(InMemorySearchIndex::new(embedder.clone()));
    search
        .index_profiles(counterparties)
        .await
        .context("Failed to index counterparty profiles")?;

    let collaborators = Collaborators {
        search,
        directory: Arc::new(InMemoryDirectory::from_profiles(counterparties.iter().cloned())),
        ledger: Arc::new(InMemoryLedger::new()),
        storage: Arc::new(InMemoryArtifactStore::new()),
        embedder,
    };
    Ok(JobOrchestrator::new(collaborators, config))
}

/// Run every scenario job through the orchestrator.
pub async fn run_scenario(orchestrator: &JobOrchestrator, scenario: &Scenario) -> Result<Vec<JobReport>> {
    let now = Utc::now();
    let mut reports = Vec::with_capacity(scenario.jobs.len());

    for scripted in &scenario.jobs {
        let submission = orchestrator
            .submit_job(scripted.to_spec(now))
            .await
            .with_context(|| format!("Job '{}' was rejected", scripted.title))?;
        let job_id = submission.job.id;
        let mut similarities = Vec::new();
        let mut error = None;

        if submission.outcome.is_active() {
            for artifact in &scripted.artifacts {
                match orchestrator.submit_artifact(job_id, artifact.as_bytes().to_vec()).await {
                    Ok(review) => {
                        if review.validation.evaluated {
                            similarities.push(review.validation.similarity);
                        }
                        if review.job.state == JobState::Completed {
                            break;
                        }
                    }
                    Err(e) => {
                        error = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = &scripted.dispute {
            if let Err(e) = orchestrator.dispute_job(job_id, reason.clone()).await {
                error = Some(e.to_string());
            }
        }

        let job = orchestrator.get_job(job_id).await?;
        reports.push(JobReport {
            job_id: job.id.to_string(),
            title: job.spec.title.clone(),
            state: job.state,
            outcome: submission.outcome,
            counterparty_id: job.counterparty_id.clone(),
            agreed_rate: job.agreed_rate,
            negotiation_rounds: job.negotiation_rounds,
            similarities,
            payment_ref: job.payment_ref.clone(),
            error,
        });
    }

    Ok(reports)
}

pub async fn execute(args: SimulateArgs, config: &Config, json_mode: bool) -> Result<()> {
    ConfigLoader::validate(config).context("Invalid configuration")?;
    let scenario = Scenario::from_path(&args.scenario)?;
    tracing::info!(
        counterparties = scenario.counterparties.len(),
        jobs = scenario.jobs.len(),
        "running scenario"
    );

    let orchestrator = local_orchestrator(config, &scenario.counterparties).await?;
    let jobs = run_scenario(&orchestrator, &scenario).await?;
    let evolution = if args.evolve {
        Some(orchestrator.trigger_evolution().await)
    } else {
        None
    };

    let result = SimulationOutput {
        jobs,
        metrics: orchestrator.performance_metrics().await,
        evolution,
    };
    output(&result, json_mode);
    Ok(())
}
