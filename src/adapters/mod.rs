//! Adapters for the collaborator ports.

pub mod embeddings;
pub mod memory;
