//! Adaptive stage thresholds.
//!
//! A [`StageThresholds`] value is an immutable snapshot. The evolution loop
//! produces a new snapshot rather than mutating the current one, so a reader
//! always sees either the old or the new pair of values.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage that produced a decision or a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Matching,
    Negotiation,
    Validation,
    Escrow,
}

impl StageKind {
    /// Stages whose threshold the evolution loop tunes.
    pub const ADAPTIVE: [StageKind; 2] = [StageKind::Matching, StageKind::Validation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matching => "matching",
            Self::Negotiation => "negotiation",
            Self::Validation => "validation",
            Self::Escrow => "escrow",
        }
    }

    pub fn is_adaptive(&self) -> bool {
        Self::ADAPTIVE.contains(self)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed inclusive range an adaptive threshold must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ThresholdBounds {
    fn default() -> Self {
        Self { min: 0.5, max: 0.95 }
    }
}

/// Thresholds are kept to this many steps per unit.
const PRECISION: f64 = 1000.0;

impl ThresholdBounds {
    /// Round `value` to three decimals, then clamp it into the range.
    pub fn clamp(&self, value: f64) -> f64 {
        ((value * PRECISION).round() / PRECISION).clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Snapshot of every adaptive threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageThresholds {
    /// Minimum search score a candidate needs to be matched.
    pub matching_confidence: f64,
    /// Minimum similarity a delivered artifact needs to pass validation.
    pub validation_similarity: f64,
    pub bounds: ThresholdBounds,
    /// Incremented on every accepted adjustment.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StageThresholds {
    /// Build the initial snapshot, clamping both values into `bounds`.
    pub fn new(matching_confidence: f64, validation_similarity: f64, bounds: ThresholdBounds) -> Self {
        Self {
            matching_confidence: bounds.clamp(matching_confidence),
            validation_similarity: bounds.clamp(validation_similarity),
            bounds,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Threshold for an adaptive stage; `None` for stages without one.
    pub fn get(&self, stage: StageKind) -> Option<f64> {
        match stage {
            StageKind::Matching => Some(self.matching_confidence),
            StageKind::Validation => Some(self.validation_similarity),
            StageKind::Negotiation | StageKind::Escrow => None,
        }
    }

    /// Return a new snapshot with `stage` set to `value` (clamped) and the
    /// version bumped. Non-adaptive stages return an unchanged clone.
    pub fn with_value(&self, stage: StageKind, value: f64) -> Self {
        let mut next = self.clone();
        let clamped = self.bounds.clamp(value);
        match stage {
            StageKind::Matching => next.matching_confidence = clamped,
            StageKind::Validation => next.validation_similarity = clamped,
            StageKind::Negotiation | StageKind::Escrow => return next,
        }
        next.version += 1;
        next.updated_at = Utc::now();
        next
    }
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self::new(0.7, 0.8, ThresholdBounds::default())
    }
}
