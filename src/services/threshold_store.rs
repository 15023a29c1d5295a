//! Process-wide adaptive thresholds.
//!
//! Readers take a cheap `Arc` clone of the current snapshot and use it for the
//! whole decision; writers build a new [`StageThresholds`] and swap it in.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::models::{StageKind, StageThresholds};

/// Holder of the current threshold snapshot.
#[derive(Debug)]
pub struct ThresholdStore {
    current: RwLock<Arc<StageThresholds>>,
}

impl ThresholdStore {
    pub fn new(initial: StageThresholds) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Current snapshot. Never observes a half-applied update.
    pub async fn current(&self) -> Arc<StageThresholds> {
        self.current.read().await.clone()
    }

    /// Threshold for a single stage, if the stage has one.
    pub async fn get(&self, stage: StageKind) -> Option<f64> {
        self.current().await.get(stage)
    }

    /// Replace the snapshot. Returns the previous one.
    pub async fn replace(&self, next: StageThresholds) -> Arc<StageThresholds> {
        let mut guard = self.current.write().await;
        std::mem::replace(&mut *guard, Arc::new(next))
    }

    /// Set one stage's threshold (clamped to bounds) and return the new snapshot.
    pub async fn set(&self, stage: StageKind, value: f64) -> Arc<StageThresholds> {
        let mut guard = self.current.write().await;
        let next = Arc::new(guard.with_value(stage, value));
        *guard = next.clone();
        next
    }
}

impl Default for ThresholdStore {
    fn default() -> Self {
        Self::new(StageThresholds::default())
    }
}
