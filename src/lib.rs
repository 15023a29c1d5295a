//! GigNova - autonomous job lifecycle orchestrator
//!
//! Drives posted jobs through matching, negotiation, escrow funding, quality
//! validation, and payment release, while an evolution loop tunes the
//! matching and validation thresholds from recorded outcomes.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain** (`domain`): entities, the error taxonomy, and port traits
//! - **Services** (`services`): the orchestrator and its stage services
//! - **Adapters** (`adapters`): in-memory collaborators and embedding providers
//! - **Infrastructure** (`infrastructure`): configuration and logging
//! - **CLI** (`cli`): the `gignova` command-line interface
//!
//! # Example
//!
//! ```ignore
//! use gignova::cli::commands::simulate::local_orchestrator;
//! use gignova::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = local_orchestrator(&Config::default(), &[]).await?;
//!     println!("{:?}", orchestrator.performance_metrics().await);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{CollaboratorError, CollaboratorResult, DomainError, DomainResult};
pub use domain::models::{
    Budget, Config, CounterpartyProfile, EscrowRecord, EscrowStatus, Job, JobSpec, JobState,
    PaymentRelease, StageKind, StageThresholds, ValidationResult,
};
pub use domain::ports::{ArtifactStore, CounterpartyDirectory, EmbeddingProvider, Ledger, SearchIndex};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ArtifactReview, Collaborators, EvolutionDaemon, EvolutionRun, JobOrchestrator, JobSubmission,
    PerformanceMetrics, PipelineOutcome,
};
