//! Port traits for the collaborators the orchestrator depends on.
//!
//! Every port is object-safe and `Send + Sync` so services can hold them as
//! `Arc<dyn ...>` and move clones into spawned tasks.

pub mod counterparty_directory;
pub mod embedding;
pub mod ledger;
pub mod search;
pub mod storage;

pub use counterparty_directory::CounterpartyDirectory;
pub use embedding::EmbeddingProvider;
pub use ledger::{EscrowRequest, Ledger};
pub use search::SearchIndex;
pub use storage::ArtifactStore;
