//! Infrastructure layer
//!
//! Configuration loading and logging setup for the binary and for embedders
//! of the library.

pub mod config;
pub mod logging;
