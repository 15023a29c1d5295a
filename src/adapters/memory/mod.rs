//! In-process collaborators for local runs, simulations, and tests.

pub mod artifact_store;
pub mod directory;
pub mod ledger;
pub mod search_index;

pub use artifact_store::InMemoryArtifactStore;
pub use directory::InMemoryDirectory;
pub use ledger::InMemoryLedger;
pub use search_index::InMemorySearchIndex;
