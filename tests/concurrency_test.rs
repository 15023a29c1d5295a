//! Concurrent use of one orchestrator from many tasks.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use common::{harness, spec, HarnessBuilder, SlowLedger, GOOD_ARTIFACT};
use gignova::adapters::memory::InMemoryLedger;
use gignova::domain::errors::DomainError;
use gignova::domain::models::JobState;
use gignova::services::PipelineOutcome;

#[tokio::test]
async fn test_parallel_submissions_are_independent() {
    let h = harness();
    let handles = (0..20).map(|i| {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_job(spec(&format!("job {i}"), 800.0, 1000.0)).await })
    });

    let mut ids = HashSet::new();
    for joined in join_all(handles).await {
        let submission = joined.unwrap().unwrap();
        assert_eq!(submission.outcome, PipelineOutcome::Active);
        ids.insert(submission.job.id);
    }

    assert_eq!(ids.len(), 20);
    assert_eq!(h.ledger.create_calls(), 20);
    assert_eq!(h.orchestrator.list_jobs().await.len(), 20);
}

#[tokio::test]
async fn test_concurrent_deliveries_release_once() {
    let h = harness();
    let job_id = h.orchestrator.submit_job(spec("landing page", 800.0, 1000.0)).await.unwrap().job.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = h.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .submit_artifact(job_id, GOOD_ARTIFACT.as_bytes().to_vec())
                .await
        }));
    }

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(review) => {
                assert_eq!(review.job.state, JobState::Completed);
                completed += 1;
            }
            Err(DomainError::InvalidTransition { from, .. }) => assert_eq!(from, JobState::Completed),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(h.ledger.release_calls(), 1);
}

#[tokio::test]
async fn test_search_timeout_is_a_matching_failure() {
    let h = HarnessBuilder::new()
        .config(|c| c.collaborators.timeout_ms = 50)
        .build();
    h.search.delay(Duration::from_secs(5));

    let submission = tokio::time::timeout(
        Duration::from_secs(2),
        h.orchestrator.submit_job(spec("landing page", 800.0, 1000.0)),
    )
    .await
    .expect("timeout bounds the search call")
    .unwrap();

    match submission.outcome {
        PipelineOutcome::NoMatches { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected NoMatches, got {other:?}"),
    }
    assert_eq!(submission.job.state, JobState::Posted);
}

#[tokio::test]
async fn test_release_timeout_is_an_escrow_failure() {
    let slow = Arc::new(SlowLedger {
        inner: InMemoryLedger::new(),
        release_delay: Duration::from_secs(5),
    });
    let h = HarnessBuilder::new()
        .config(|c| c.collaborators.timeout_ms = 50)
        .ledger(slow.clone())
        .build();
    let job_id = h.orchestrator.submit_job(spec("landing page", 800.0, 1000.0)).await.unwrap().job.id;

    let err = h
        .orchestrator
        .submit_artifact(job_id, GOOD_ARTIFACT.as_bytes().to_vec())
        .await
        .unwrap_err();

    match err {
        DomainError::EscrowFailed { job_id: failed, reason } => {
            assert_eq!(failed, job_id);
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("expected escrow failure, got {other}"),
    }
    // The aborted call never reached the ledger.
    assert_eq!(slow.inner.release_calls(), 0);
    assert_eq!(h.orchestrator.get_job(job_id).await.unwrap().state, JobState::InQA);
}

#[tokio::test]
async fn test_slow_job_does_not_block_other_jobs() {
    let slow = Arc::new(SlowLedger {
        inner: InMemoryLedger::new(),
        release_delay: Duration::from_millis(300),
    });
    let h = HarnessBuilder::new().ledger(slow.clone()).build();
    let busy = h.orchestrator.submit_job(spec("busy", 800.0, 1000.0)).await.unwrap().job.id;
    let idle = h.orchestrator.submit_job(spec("idle", 800.0, 1000.0)).await.unwrap().job.id;

    let orchestrator = h.orchestrator.clone();
    let delivery = tokio::spawn(async move {
        orchestrator
            .submit_artifact(busy, GOOD_ARTIFACT.as_bytes().to_vec())
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let job = tokio::time::timeout(Duration::from_millis(100), h.orchestrator.get_job(idle))
        .await
        .expect("other jobs stay responsive")
        .unwrap();
    assert_eq!(job.state, JobState::Active);

    let review = delivery.await.unwrap().unwrap();
    assert_eq!(review.job.state, JobState::Completed);
    assert_eq!(slow.inner.release_calls(), 1);
}

#[tokio::test]
async fn test_metrics_do_not_wait_for_in_flight_jobs() {
    let slow = Arc::new(SlowLedger {
        inner: InMemoryLedger::new(),
        release_delay: Duration::from_millis(400),
    });
    let h = HarnessBuilder::new()
        .config(|c| c.collaborators.timeout_ms = 1000)
        .ledger(slow.clone())
        .build();
    let busy = h.orchestrator.submit_job(spec("busy", 800.0, 1000.0)).await.unwrap().job.id;

    let orchestrator = h.orchestrator.clone();
    let delivery = tokio::spawn(async move {
        orchestrator
            .submit_artifact(busy, GOOD_ARTIFACT.as_bytes().to_vec())
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let metrics = tokio::time::timeout(Duration::from_millis(100), h.orchestrator.performance_metrics())
        .await
        .expect("metrics read published snapshots");
    assert_eq!(metrics.total_jobs, 1);
    assert_eq!(metrics.active_jobs, 1);
    assert_eq!(metrics.payments_released, 0);

    delivery.await.unwrap().unwrap();
    let metrics = h.orchestrator.performance_metrics().await;
    assert_eq!(metrics.jobs_by_state.get("completed"), Some(&1));
    assert_eq!(metrics.payments_released, 1);
}
