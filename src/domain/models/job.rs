//! Job domain model.
//!
//! A job moves forward through `Posted → Matched → Negotiating → Active → InQA →
//! Completed`, or leaves early for `Disputed` / `Cancelled`. All mutation goes
//! through the transition methods on [`Job`]; nothing assigns `state` directly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::escrow::EscrowRecord;
use super::validation::ValidationResult;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, awaiting a counterparty
    Posted,
    /// Counterparty chosen
    Matched,
    /// Rate negotiation in progress (or failed to converge)
    Negotiating,
    /// Escrow funded, work underway
    Active,
    /// Artifact delivered, under quality validation
    InQA,
    /// Payment released
    Completed,
    /// Diverted into dispute resolution
    Disputed,
    /// Withdrawn before funding
    Cancelled,
}

impl JobState {
    pub const ALL: [JobState; 8] = [
        Self::Posted,
        Self::Matched,
        Self::Negotiating,
        Self::Active,
        Self::InQA,
        Self::Completed,
        Self::Disputed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Matched => "matched",
            Self::Negotiating => "negotiating",
            Self::Active => "active",
            Self::InQA => "in_qa",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "posted" => Some(Self::Posted),
            "matched" => Some(Self::Matched),
            "negotiating" => Some(Self::Negotiating),
            "active" => Some(Self::Active),
            "in_qa" | "inqa" => Some(Self::InQA),
            "completed" | "complete" => Some(Self::Completed),
            "disputed" => Some(Self::Disputed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Position on the forward path; side exits have no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Posted => Some(0),
            Self::Matched => Some(1),
            Self::Negotiating => Some(2),
            Self::Active => Some(3),
            Self::InQA => Some(4),
            Self::Completed => Some(5),
            Self::Disputed | Self::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Disputed | Self::Cancelled)
    }

    /// States in which no funds are held, so the job may still be cancelled.
    pub fn is_pre_funding(&self) -> bool {
        matches!(self, Self::Posted | Self::Matched | Self::Negotiating)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<JobState> {
        match self {
            Self::Posted => vec![Self::Matched, Self::Disputed, Self::Cancelled],
            Self::Matched => vec![Self::Negotiating, Self::Disputed, Self::Cancelled],
            Self::Negotiating => vec![Self::Active, Self::Disputed, Self::Cancelled],
            Self::Active => vec![Self::InQA, Self::Disputed, Self::Cancelled],
            Self::InQA => vec![Self::Completed, Self::Disputed, Self::Cancelled],
            Self::Completed | Self::Disputed | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requester's acceptable price range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub min: f64,
    pub max: f64,
}

impl Budget {
    pub fn validate(&self) -> Result<(), String> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err("budget bounds must be finite numbers".to_string());
        }
        if self.min < 0.0 {
            return Err(format!("budget min {} cannot be negative", self.min));
        }
        if self.max < self.min {
            return Err(format!(
                "budget max {} is below budget min {}",
                self.max, self.min
            ));
        }
        Ok(())
    }
}

/// Input for posting a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Acceptance criteria, one per line item.
    #[serde(default)]
    pub requirements: Vec<String>,
    pub budget: Budget,
    pub deadline: DateTime<Utc>,
    pub requester_id: String,
}

impl JobSpec {
    /// Reject malformed input before any job state exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if self.requester_id.trim().is_empty() {
            return Err("requester id cannot be empty".to_string());
        }
        self.budget.validate()
    }

    /// Text handed to the similarity search when looking for counterparties.
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.title.trim(), self.description.trim()];
        parts.extend(self.skills.iter().map(|s| s.trim()));
        join_non_empty(&parts)
    }

    /// Text a delivered artifact is compared against.
    pub fn requirements_text(&self) -> String {
        let mut parts = vec![self.title.trim(), self.description.trim()];
        parts.extend(self.requirements.iter().map(|r| r.trim()));
        join_non_empty(&parts)
    }
}

fn join_non_empty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// One entry of a job's state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: JobState,
    pub at: DateTime<Utc>,
}

/// A unit of work posted by a requester and fulfilled by a counterparty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub spec: JobSpec,
    pub state: JobState,
    /// Every state the job has entered, oldest first, including the current one.
    pub history: Vec<StateChange>,
    /// Cleared when a matching attempt finds nobody above the threshold.
    pub matchable: bool,
    pub last_match_attempt: Option<DateTime<Utc>>,
    pub counterparty_id: Option<String>,
    pub match_confidence: Option<f64>,
    pub match_reasons: Vec<String>,
    pub negotiation_rounds: Option<u32>,
    pub agreed_rate: Option<f64>,
    pub escrow: Option<EscrowRecord>,
    pub last_validation: Option<ValidationResult>,
    pub submissions: u32,
    pub payment_ref: Option<String>,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every mutation.
    pub version: u64,
}

impl Job {
    /// Create a job in `Posted`. Callers validate the spec first.
    pub fn new(spec: JobSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            spec,
            state: JobState::Posted,
            history: vec![StateChange {
                state: JobState::Posted,
                at: now,
            }],
            matchable: true,
            last_match_attempt: None,
            counterparty_id: None,
            match_confidence: None,
            match_reasons: Vec::new(),
            negotiation_rounds: None,
            agreed_rate: None,
            escrow: None,
            last_validation: None,
            submissions: 0,
            payment_ref: None,
            dispute_reason: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        self.state.can_transition_to(next)
    }

    /// Move to `next`, enforcing the transition table and the payment
    /// preconditions for `Completed`.
    pub fn transition_to(&mut self, next: JobState) -> Result<(), String> {
        if !self.can_transition_to(next) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.state.as_str(),
                next.as_str()
            ));
        }
        self.check_preconditions(next)?;

        let now = Utc::now();
        self.state = next;
        self.history.push(StateChange { state: next, at: now });
        self.touch();
        Ok(())
    }

    fn check_preconditions(&self, next: JobState) -> Result<(), String> {
        match next {
            JobState::Matched if self.counterparty_id.is_none() => {
                Err("cannot enter matched without a counterparty".to_string())
            }
            JobState::Active if self.escrow.is_none() || self.agreed_rate.is_none() => {
                Err("cannot activate without an agreed rate and escrow".to_string())
            }
            JobState::Completed if self.payment_ref.is_none() => {
                Err("cannot complete before payment is released".to_string())
            }
            JobState::Completed
                if !self.last_validation.as_ref().is_some_and(|v| v.passed) =>
            {
                Err("cannot complete without a passed validation".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Record that matching found nobody; the job stays `Posted`.
    pub fn mark_unmatchable(&mut self) {
        self.matchable = false;
        self.last_match_attempt = Some(Utc::now());
        self.touch();
    }

    pub fn assign_counterparty(&mut self, counterparty_id: String, confidence: f64, reasons: Vec<String>) {
        self.matchable = true;
        self.last_match_attempt = Some(Utc::now());
        self.counterparty_id = Some(counterparty_id);
        self.match_confidence = Some(confidence);
        self.match_reasons = reasons;
        self.touch();
    }

    pub fn record_negotiation(&mut self, rounds: u32, agreed_rate: Option<f64>) {
        self.negotiation_rounds = Some(rounds);
        self.agreed_rate = agreed_rate;
        self.touch();
    }

    pub fn attach_escrow(&mut self, escrow: EscrowRecord) {
        self.escrow = Some(escrow);
        self.touch();
    }

    pub fn record_validation(&mut self, result: ValidationResult) {
        self.submissions += 1;
        self.last_validation = Some(result);
        self.touch();
    }

    pub fn record_payment(&mut self, transaction_ref: String) {
        self.payment_ref = Some(transaction_ref);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// States visited so far, oldest first.
    pub fn visited_states(&self) -> Vec<JobState> {
        self.history.iter().map(|c| c.state).collect()
    }
}
