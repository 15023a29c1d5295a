pub mod collaborator;
pub mod escrow;
pub mod evolution_daemon;
pub mod evolution_loop;
pub mod job_orchestrator;
pub mod matching;
pub mod metrics;
pub mod negotiation;
pub mod outcome_history;
pub mod quality;
pub mod threshold_store;

pub use escrow::EscrowService;
pub use evolution_daemon::{
    DaemonHandle, DaemonStatus, EvolutionDaemon, EvolutionDaemonConfig, EvolutionDaemonEvent, StopReason,
};
pub use evolution_loop::{EvolutionAction, EvolutionLoop, EvolutionReport, EvolutionRun, StageStats};
pub use job_orchestrator::{ArtifactReview, Collaborators, JobOrchestrator, JobSubmission, PipelineOutcome};
pub use matching::MatchingService;
pub use metrics::PerformanceMetrics;
pub use negotiation::negotiate;
pub use outcome_history::OutcomeHistory;
pub use quality::QualityService;
pub use threshold_store::ThresholdStore;
