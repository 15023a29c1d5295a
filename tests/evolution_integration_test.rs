//! Threshold evolution driven by real job outcomes.

mod common;

use std::time::Duration;

use common::{profile, spec, HarnessBuilder, WEAK_ARTIFACT};
use gignova::domain::models::StageKind;
use gignova::services::{
    EvolutionAction, EvolutionDaemon, EvolutionDaemonConfig, EvolutionDaemonEvent, EvolutionRun, PipelineOutcome,
};

fn action_for(run: &EvolutionRun, stage: StageKind) -> EvolutionAction {
    match run {
        EvolutionRun::Completed(report) => report
            .evaluations
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| e.action.clone())
            .expect("stage evaluated"),
        EvolutionRun::Skipped { reason } => panic!("run skipped: {reason}"),
    }
}

#[tokio::test]
async fn test_no_adjustment_below_min_samples() {
    let h = HarnessBuilder::new().build();
    h.orchestrator.submit_job(spec("one", 800.0, 1000.0)).await.unwrap();

    let run = h.orchestrator.trigger_evolution().await;

    for stage in StageKind::ADAPTIVE {
        match action_for(&run, stage) {
            EvolutionAction::NoAction { reason } => assert!(reason.starts_with("Insufficient samples")),
            other => panic!("expected no action, got {other:?}"),
        }
    }
    let thresholds = h.orchestrator.thresholds().current().await;
    assert_eq!(thresholds.version, 0);
}

#[tokio::test]
async fn test_false_positive_matches_raise_matching_threshold() {
    let h = HarnessBuilder::new()
        .config(|c| {
            c.evolution.min_samples = 4;
            c.negotiation.max_rounds = 1;
        })
        .profiles(vec![profile("dev-1", Some(10_000.0))])
        .build();

    for i in 0..4 {
        let submission = h.orchestrator.submit_job(spec(&format!("job {i}"), 800.0, 1000.0)).await.unwrap();
        assert!(matches!(submission.outcome, PipelineOutcome::NegotiationFailed { .. }));
    }

    let run = h.orchestrator.trigger_evolution().await;

    match action_for(&run, StageKind::Matching) {
        EvolutionAction::Raised { from, to } => {
            assert!((from - 0.7).abs() < 1e-9);
            assert!((to - 0.75).abs() < 1e-9);
        }
        other => panic!("expected raise, got {other:?}"),
    }
    assert!(matches!(action_for(&run, StageKind::Validation), EvolutionAction::NoAction { .. }));

    let current = h.orchestrator.thresholds().current().await;
    assert!((current.matching_confidence - 0.75).abs() < 1e-9);
    assert!((current.validation_similarity - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_hopeless_no_matches_leave_matching_threshold_alone() {
    let h = HarnessBuilder::new()
        .config(|c| c.evolution.min_samples = 4)
        .hits(&[("dev-1", 0.05)])
        .build();

    for i in 0..4 {
        let submission = h.orchestrator.submit_job(spec(&format!("job {i}"), 800.0, 1000.0)).await.unwrap();
        assert!(matches!(submission.outcome, PipelineOutcome::NoMatches { .. }));
    }

    let run = h.orchestrator.trigger_evolution().await;

    match action_for(&run, StageKind::Matching) {
        EvolutionAction::NoAction { reason } => assert!(reason.starts_with("Insufficient samples"), "{reason}"),
        other => panic!("expected no action, got {other:?}"),
    }
    let current = h.orchestrator.thresholds().current().await;
    assert!((current.matching_confidence - 0.7).abs() < 1e-9);
    assert_eq!(current.version, 0);
}

#[tokio::test]
async fn test_near_miss_no_matches_lower_matching_threshold() {
    let h = HarnessBuilder::new()
        .config(|c| c.evolution.min_samples = 4)
        .hits(&[("dev-1", 0.69)])
        .build();

    for i in 0..4 {
        let submission = h.orchestrator.submit_job(spec(&format!("job {i}"), 800.0, 1000.0)).await.unwrap();
        assert!(matches!(submission.outcome, PipelineOutcome::NoMatches { .. }));
    }

    let run = h.orchestrator.trigger_evolution().await;

    assert_eq!(
        action_for(&run, StageKind::Matching),
        EvolutionAction::Lowered { from: 0.7, to: 0.68 }
    );
}

#[tokio::test]
async fn test_disputed_rejections_lower_validation_threshold() {
    let h = HarnessBuilder::new()
        .config(|c| c.evolution.min_samples = 3)
        .build();

    for i in 0..3 {
        let job_id = h.orchestrator.submit_job(spec(&format!("job {i}"), 800.0, 1000.0)).await.unwrap().job.id;
        h.orchestrator
            .submit_artifact(job_id, WEAK_ARTIFACT.as_bytes().to_vec())
            .await
            .unwrap();
        h.orchestrator.dispute_job(job_id, "work was fine").await.unwrap();
    }

    let run = h.orchestrator.trigger_evolution().await;

    match action_for(&run, StageKind::Validation) {
        EvolutionAction::Lowered { from, to } => {
            assert!((from - 0.8).abs() < 1e-9);
            assert!((to - 0.78).abs() < 1e-9);
        }
        other => panic!("expected lower, got {other:?}"),
    }
    // The accepted matches also ended badly.
    assert!(matches!(action_for(&run, StageKind::Matching), EvolutionAction::Raised { .. }));
}

#[tokio::test]
async fn test_adjustment_is_clamped_to_bounds() {
    let h = HarnessBuilder::new()
        .config(|c| {
            c.evolution.min_samples = 2;
            c.negotiation.max_rounds = 1;
            c.thresholds.max = 0.72;
        })
        .profiles(vec![profile("dev-1", Some(10_000.0))])
        .build();
    for i in 0..2 {
        h.orchestrator.submit_job(spec(&format!("job {i}"), 800.0, 1000.0)).await.unwrap();
    }

    let first = h.orchestrator.trigger_evolution().await;
    match action_for(&first, StageKind::Matching) {
        EvolutionAction::Raised { to, .. } => assert!((to - 0.72).abs() < 1e-9),
        other => panic!("expected clamped raise, got {other:?}"),
    }

    let second = h.orchestrator.trigger_evolution().await;
    match action_for(&second, StageKind::Matching) {
        EvolutionAction::NoAction { reason } => assert!(reason.contains("bound")),
        other => panic!("expected no action at bound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_daemon_runs_loop_and_stops() {
    let h = HarnessBuilder::new().build();
    let daemon = EvolutionDaemon::new(
        h.orchestrator.evolution(),
        EvolutionDaemonConfig {
            interval: Duration::from_millis(20),
            run_on_startup: true,
        },
    );
    let handle = daemon.handle();
    let mut events = daemon.run();

    assert!(matches!(events.recv().await, Some(EvolutionDaemonEvent::Started)));
    assert!(matches!(
        events.recv().await,
        Some(EvolutionDaemonEvent::RunCompleted { run_number: 1, .. })
    ));

    handle.stop();
    let stopped = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if matches!(event, EvolutionDaemonEvent::Stopped { .. }) {
                return true;
            }
        }
        false
    })
    .await
    .expect("daemon stops promptly");
    assert!(stopped);

    let status = handle.status().await;
    assert!(!status.running);
    assert!(status.completed_runs >= 1);
    assert_eq!(h.orchestrator.evolution().reports().await.len() as u64, status.completed_runs);
}
