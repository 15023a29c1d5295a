//! Matching stage: rank counterparties for a job by similarity search.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::{CounterpartyProfile, JobSpec, Match, SearchHit, StageKind};
use crate::domain::ports::{CounterpartyDirectory, SearchIndex};
use crate::services::collaborator::call_with_timeout;

/// Candidates that cleared the threshold, plus the best score seen overall.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingResult {
    /// Hits at or above the threshold, highest score first.
    pub candidates: Vec<SearchHit>,
    /// Highest score returned by the search, accepted or not.
    pub top_score: Option<f64>,
}

impl MatchingResult {
    pub fn best(&self) -> Option<&SearchHit> {
        self.candidates.first()
    }
}

pub struct MatchingService {
    search: Arc<dyn SearchIndex>,
    directory: Arc<dyn CounterpartyDirectory>,
    candidate_limit: usize,
    timeout: Duration,
}

impl MatchingService {
    pub fn new(
        search: Arc<dyn SearchIndex>,
        directory: Arc<dyn CounterpartyDirectory>,
        candidate_limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            search,
            directory,
            candidate_limit,
            timeout,
        }
    }

    /// Search for candidates and keep those scoring at or above `threshold`.
    pub async fn find_candidates(&self, spec: &JobSpec, threshold: f64) -> CollaboratorResult<MatchingResult> {
        let query = spec.search_text();
        let limit = self.candidate_limit;
        let search = self.search.clone();
        let mut hits = call_with_timeout(StageKind::Matching, self.timeout, async move {
            search.search(&query, limit).await
        })
        .await?;

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let top_score = hits.first().map(|h| h.score);
        let candidates: Vec<SearchHit> = hits.into_iter().filter(|h| h.score >= threshold).collect();

        tracing::debug!(
            returned = candidates.len(),
            top_score = ?top_score,
            threshold,
            "matching candidates filtered"
        );

        Ok(MatchingResult { candidates, top_score })
    }

    /// Look up the chosen candidate and explain the match.
    ///
    /// A directory failure is logged and treated as an unknown profile.
    pub async fn describe(&self, spec: &JobSpec, hit: &SearchHit) -> (Match, Option<CounterpartyProfile>) {
        let directory = self.directory.clone();
        let id = hit.counterparty_id.clone();
        let profile = match call_with_timeout(StageKind::Matching, self.timeout, async move {
            directory.get(&id).await
        })
        .await
        {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(
                    counterparty_id = %hit.counterparty_id,
                    error = %e,
                    "counterparty lookup failed"
                );
                None
            }
        };

        let mut reasons = vec![format!("Skill match: {:.2}", hit.score)];
        if let Some(ref p) = profile {
            let shared = p.shared_skills(&spec.skills);
            if !shared.is_empty() {
                reasons.push(format!("Shared skills: {}", shared.join(", ")));
            }
            if let Some(rating) = p.rating {
                reasons.push(format!("Rating: {rating:.1}"));
            }
        }

        let matched = Match {
            counterparty_id: hit.counterparty_id.clone(),
            confidence: hit.score,
            reasons,
        };
        (matched, profile)
    }
}
