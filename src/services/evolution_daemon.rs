//! Evolution background daemon.
//!
//! Runs the evolution loop on a fixed interval until stopped. Manual
//! `trigger_evolution` calls share the loop's non-overlap guard, so a
//! scheduled tick that lands during a manual run is reported as skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::models::EvolutionConfig;
use crate::services::evolution_loop::{EvolutionLoop, EvolutionRun};

/// Configuration for the evolution daemon.
#[derive(Debug, Clone)]
pub struct EvolutionDaemonConfig {
    /// Interval between runs.
    pub interval: Duration,
    /// Whether to run on startup.
    pub run_on_startup: bool,
}

impl Default for EvolutionDaemonConfig {
    fn default() -> Self {
        Self::from(&EvolutionConfig::default())
    }
}

impl From<&EvolutionConfig> for EvolutionDaemonConfig {
    fn from(config: &EvolutionConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            run_on_startup: config.run_on_startup,
        }
    }
}

/// Event emitted by the daemon.
#[derive(Debug, Clone)]
pub enum EvolutionDaemonEvent {
    /// Daemon started.
    Started,
    /// A run finished.
    RunCompleted {
        run_number: u64,
        adjustments: usize,
        duration_ms: u64,
    },
    /// A run was skipped because another was in progress.
    RunSkipped { run_number: u64, reason: String },
    /// Daemon stopped.
    Stopped { reason: StopReason },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Requested to stop.
    Requested,
    /// Event receiver dropped.
    ChannelClosed,
}

/// Status of the daemon.
#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_runs: u64,
    pub completed_runs: u64,
    pub skipped_runs: u64,
    /// Threshold changes applied across all runs.
    pub total_adjustments: u64,
    pub last_run: Option<Instant>,
}

/// Handle to control the daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Request the daemon to stop. Takes effect without waiting for the next tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

pub struct EvolutionDaemon {
    evolution: Arc<EvolutionLoop>,
    config: EvolutionDaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl EvolutionDaemon {
    pub fn new(evolution: Arc<EvolutionLoop>, config: EvolutionDaemonConfig) -> Self {
        Self {
            evolution,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Create using the loop's own configuration.
    pub fn with_defaults(evolution: Arc<EvolutionLoop>) -> Self {
        let config = EvolutionDaemonConfig::from(evolution.config());
        Self::new(evolution, config)
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            wake: self.wake.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the daemon, returning a channel for events.
    pub fn run(self) -> mpsc::Receiver<EvolutionDaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<EvolutionDaemonEvent>) {
        self.status.write().await.running = true;
        tracing::info!(interval_secs = self.config.interval.as_secs(), "evolution daemon started");
        let mut reason = StopReason::Requested;

        if tx.send(EvolutionDaemonEvent::Started).await.is_err() {
            reason = StopReason::ChannelClosed;
        } else {
            let mut timer = interval(self.config.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            timer.tick().await;

            if self.config.run_on_startup && !self.run_cycle(&tx).await {
                reason = StopReason::ChannelClosed;
            } else {
                loop {
                    if self.stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    tokio::select! {
                        _ = timer.tick() => {
                            if self.stop_flag.load(Ordering::Acquire) {
                                break;
                            }
                            if !self.run_cycle(&tx).await {
                                reason = StopReason::ChannelClosed;
                                break;
                            }
                        }
                        () = self.wake.notified() => {}
                    }
                }
            }
        }

        self.status.write().await.running = false;
        tracing::info!(?reason, "evolution daemon stopped");
        let _ = tx.send(EvolutionDaemonEvent::Stopped { reason }).await;
    }

    /// Run once and report. Returns false when the event receiver is gone.
    async fn run_cycle(&self, tx: &mpsc::Sender<EvolutionDaemonEvent>) -> bool {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let start = Instant::now();
        let outcome = self.evolution.run().await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let event = {
            let mut status = self.status.write().await;
            status.last_run = Some(Instant::now());
            match outcome {
                EvolutionRun::Completed(report) => {
                    let adjustments = report.adjustments();
                    status.completed_runs += 1;
                    status.total_adjustments += adjustments as u64;
                    EvolutionDaemonEvent::RunCompleted {
                        run_number,
                        adjustments,
                        duration_ms,
                    }
                }
                EvolutionRun::Skipped { reason } => {
                    status.skipped_runs += 1;
                    EvolutionDaemonEvent::RunSkipped { run_number, reason }
                }
            }
        };

        tx.send(event).await.is_ok()
    }

    /// Get current status.
    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }

    pub fn config(&self) -> &EvolutionDaemonConfig {
        &self.config
    }
}
