use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Feedback attached when the artifact could not be stored or fetched.
pub const UNRETRIEVABLE_FEEDBACK: &str = "Could not retrieve deliverable for validation.";

/// Cosine similarity of two vectors, clamped to `[0, 1]`.
///
/// Mismatched lengths, empty inputs, and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Outcome of comparing a delivered artifact to the job requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub job_id: Uuid,
    /// Content reference of the stored artifact, if storing succeeded.
    pub artifact_ref: Option<String>,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f64,
    /// Threshold in force when this result was produced.
    pub threshold: f64,
    pub passed: bool,
    /// False when no similarity could be computed (artifact or embedding unavailable).
    #[serde(default = "default_evaluated")]
    pub evaluated: bool,
    pub feedback: String,
    pub validated_at: DateTime<Utc>,
}

const fn default_evaluated() -> bool {
    true
}

impl ValidationResult {
    /// Build a result; `passed` is `similarity >= threshold`.
    pub fn new(job_id: Uuid, artifact_ref: Option<String>, similarity: f64, threshold: f64) -> Self {
        let similarity = similarity.clamp(0.0, 1.0);
        let passed = similarity >= threshold;
        let verdict = if passed { "Approved." } else { "Needs revision." };
        Self {
            job_id,
            artifact_ref,
            similarity,
            threshold,
            passed,
            evaluated: true,
            feedback: format!("Similarity score: {similarity:.2}. {verdict}"),
            validated_at: Utc::now(),
        }
    }

    /// Failed result for an artifact that could not be retrieved.
    pub fn unretrievable(job_id: Uuid, artifact_ref: Option<String>, threshold: f64) -> Self {
        Self::not_evaluated(job_id, artifact_ref, threshold, UNRETRIEVABLE_FEEDBACK)
    }

    /// Failed result with zero similarity and the given explanation.
    pub fn not_evaluated(
        job_id: Uuid,
        artifact_ref: Option<String>,
        threshold: f64,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            artifact_ref,
            similarity: 0.0,
            threshold,
            passed: false,
            evaluated: false,
            feedback: feedback.into(),
            validated_at: Utc::now(),
        }
    }
}
