use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A provider known to the counterparty directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Self-described experience, included in the search text.
    #[serde(default)]
    pub experience: String,
    /// Asking rate for a job; `None` when the provider has not published one.
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default = "default_available")]
    pub available: bool,
    /// Cumulative rating from completed jobs.
    #[serde(default)]
    pub rating: Option<f64>,
}

const fn default_available() -> bool {
    true
}

impl CounterpartyProfile {
    /// Text indexed for similarity search.
    pub fn profile_text(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        parts.extend(self.skills.iter().map(String::as_str));
        if !self.experience.is_empty() {
            parts.push(self.experience.as_str());
        }
        parts.join(" ")
    }

    /// Skills shared with `wanted`, compared case-insensitively, in `wanted` order.
    pub fn shared_skills(&self, wanted: &[String]) -> Vec<String> {
        wanted
            .iter()
            .filter(|w| self.skills.iter().any(|s| s.eq_ignore_ascii_case(w)))
            .cloned()
            .collect()
    }
}

/// A candidate accepted by matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub counterparty_id: String,
    /// Search score of the chosen candidate.
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// One hit returned by the similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub counterparty_id: String,
    /// Similarity in `[0, 1]`.
    pub score: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SearchHit {
    pub fn new(counterparty_id: impl Into<String>, score: f64) -> Self {
        Self {
            counterparty_id: counterparty_id.into(),
            score,
            metadata: HashMap::new(),
        }
    }
}
