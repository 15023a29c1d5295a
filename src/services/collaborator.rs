//! Bounded calls into external collaborators.
//!
//! Every search, ledger, storage, and embedding call runs on its own spawned
//! task under a deadline. A deadline miss or a panicked task becomes a
//! [`CollaboratorError`] for the calling stage to convert; it never unwinds
//! into the orchestrator.

use std::future::Future;
use std::time::Duration;

use crate::domain::errors::{CollaboratorError, CollaboratorResult};
use crate::domain::models::StageKind;

/// Run `fut` on a spawned task, failing with [`CollaboratorError::Timeout`]
/// if it does not finish within `timeout`.
///
/// The future must own its inputs; clone `Arc` handles into an `async move`
/// block before calling.
pub async fn call_with_timeout<T, F>(stage: StageKind, timeout: Duration, fut: F) -> CollaboratorResult<T>
where
    T: Send + 'static,
    F: Future<Output = CollaboratorResult<T>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    let abort = handle.abort_handle();

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            tracing::error!(stage = %stage, error = %join_err, "collaborator task failed");
            Err(CollaboratorError::TaskFailed(join_err.to_string()))
        }
        Err(_) => {
            abort.abort();
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(stage = %stage, timeout_ms, "collaborator call timed out");
            Err(CollaboratorError::Timeout { stage, timeout_ms })
        }
    }
}
