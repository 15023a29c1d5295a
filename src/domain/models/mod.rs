pub mod config;
pub mod counterparty;
pub mod escrow;
pub mod job;
pub mod negotiation;
pub mod outcome;
pub mod thresholds;
pub mod validation;

pub use config::{
    CollaboratorConfig, Config, EmbeddingsConfig, EvolutionConfig, LoggingConfig, MatchingConfig,
    NegotiationConfig, ThresholdConfig,
};
pub use counterparty::{CounterpartyProfile, Match, SearchHit};
pub use escrow::{EscrowRecord, EscrowStatus, PaymentRelease};
pub use job::{Budget, Job, JobSpec, JobState, StateChange};
pub use negotiation::{NegotiationOutcome, NegotiationParams};
pub use outcome::{OutcomeRecord, Resolution};
pub use thresholds::{StageKind, StageThresholds, ThresholdBounds};
pub use validation::{cosine_similarity, ValidationResult};
