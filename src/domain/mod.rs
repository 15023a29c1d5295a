//! Domain layer for the GigNova job lifecycle.
//!
//! Contains the typed entities, the error taxonomy, and the port traits the
//! services depend on. Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CollaboratorError, CollaboratorResult, DomainError, DomainResult};
