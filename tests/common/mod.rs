//! Common test utilities for integration tests
//!
//! Scripted collaborators with call counters, plus a harness that wires them
//! into a `JobOrchestrator`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use gignova::adapters::memory::{InMemoryArtifactStore, InMemoryDirectory, InMemoryLedger};
use gignova::domain::errors::{CollaboratorError, CollaboratorResult};
use gignova::domain::models::{Budget, Config, CounterpartyProfile, EscrowStatus, JobSpec, SearchHit};
use gignova::domain::ports::{ArtifactStore, EmbeddingProvider, EscrowRequest, Ledger, SearchIndex};
use gignova::services::{Collaborators, JobOrchestrator};

/// Setup test logging
///
/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Artifact text whose scripted similarity to any requirements text is 0.92.
pub const GOOD_ARTIFACT: &str = "good deliverable";
/// Artifact text whose scripted similarity to any requirements text is 0.5.
pub const WEAK_ARTIFACT: &str = "weak deliverable";

pub fn spec(title: &str, min: f64, max: f64) -> JobSpec {
    JobSpec {
        title: title.to_string(),
        description: format!("{title} for a small business"),
        skills: vec!["html".to_string(), "css".to_string()],
        requirements: vec!["responsive layout".to_string()],
        budget: Budget { min, max },
        deadline: Utc::now() + chrono::Duration::days(7),
        requester_id: "client-1".to_string(),
    }
}

pub fn profile(id: &str, rate: Option<f64>) -> CounterpartyProfile {
    CounterpartyProfile {
        id: id.to_string(),
        name: format!("Provider {id}"),
        skills: vec!["html".to_string(), "css".to_string(), "javascript".to_string()],
        experience: String::new(),
        hourly_rate: rate,
        available: true,
        rating: Some(4.5),
    }
}

/// Search index returning a fixed hit list.
#[derive(Default)]
pub struct ScriptedSearch {
    hits: Mutex<Vec<SearchHit>>,
    fail: Mutex<Option<CollaboratorError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedSearch {
    pub fn with_hits(hits: &[(&str, f64)]) -> Self {
        let search = Self::default();
        search.set_hits(hits);
        search
    }

    pub fn set_hits(&self, hits: &[(&str, f64)]) {
        *self.hits.lock().unwrap() = hits.iter().map(|(id, score)| SearchHit::new(*id, *score)).collect();
    }

    pub fn fail_with(&self, error: CollaboratorError) {
        *self.fail.lock().unwrap() = Some(error);
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for ScriptedSearch {
    async fn search(&self, _query: &str, limit: usize) -> CollaboratorResult<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.fail.lock().unwrap().clone() {
            return Err(error);
        }
        let mut hits = self.hits.lock().unwrap().clone();
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Embedder with scripted vectors per text.
///
/// Unknown text maps to the unit x-axis, so a scripted artifact vector
/// `[s, sqrt(1 - s^2)]` scores exactly `s` against any requirements text.
#[derive(Default)]
pub struct ScriptedEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    fail: Mutex<bool>,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        let embedder = Self::default();
        embedder.script_similarity(GOOD_ARTIFACT, 0.92);
        embedder.script_similarity(WEAK_ARTIFACT, 0.5);
        embedder
    }

    pub fn script_similarity(&self, text: &str, similarity: f32) {
        let orthogonal = (1.0 - similarity * similarity).max(0.0).sqrt();
        self.vectors
            .lock()
            .unwrap()
            .insert(text.to_string(), vec![similarity, orthogonal]);
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed(&self, text: &str) -> CollaboratorResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(CollaboratorError::Unavailable("embedding backend down".to_string()));
        }
        Ok(self
            .vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![1.0, 0.0]))
    }
}

/// Ledger wrapper that sleeps before releasing.
pub struct SlowLedger {
    pub inner: InMemoryLedger,
    pub release_delay: Duration,
}

#[async_trait]
impl Ledger for SlowLedger {
    async fn create_escrow(&self, request: &EscrowRequest) -> CollaboratorResult<String> {
        self.inner.create_escrow(request).await
    }

    async fn release_escrow(&self, escrow_id: &str) -> CollaboratorResult<String> {
        tokio::time::sleep(self.release_delay).await;
        self.inner.release_escrow(escrow_id).await
    }

    async fn get_status(&self, escrow_id: &str) -> CollaboratorResult<EscrowStatus> {
        self.inner.get_status(escrow_id).await
    }
}

/// Artifact store that accepts writes but never returns them.
#[derive(Default)]
pub struct ForgetfulStore;

#[async_trait]
impl ArtifactStore for ForgetfulStore {
    async fn store(&self, bytes: Vec<u8>) -> CollaboratorResult<String> {
        Ok(InMemoryArtifactStore::content_id(&bytes))
    }

    async fn retrieve(&self, artifact_id: &str) -> CollaboratorResult<Vec<u8>> {
        Err(CollaboratorError::NotFound(artifact_id.to_string()))
    }
}

/// Orchestrator wired to scripted collaborators, with handles kept for assertions.
pub struct Harness {
    pub orchestrator: Arc<JobOrchestrator>,
    pub search: Arc<ScriptedSearch>,
    pub embedder: Arc<ScriptedEmbedder>,
    pub ledger: Arc<InMemoryLedger>,
    pub directory: Arc<InMemoryDirectory>,
}

pub struct HarnessBuilder {
    config: Config,
    hits: Vec<(String, f64)>,
    profiles: Vec<CounterpartyProfile>,
    ledger: Option<Arc<dyn Ledger>>,
    storage: Option<Arc<dyn ArtifactStore>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            hits: vec![("dev-1".to_string(), 0.9)],
            profiles: vec![profile("dev-1", None)],
            ledger: None,
            storage: None,
        }
    }

    pub fn config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn hits(mut self, hits: &[(&str, f64)]) -> Self {
        self.hits = hits.iter().map(|(id, s)| ((*id).to_string(), *s)).collect();
        self
    }

    pub fn profiles(mut self, profiles: Vec<CounterpartyProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn ArtifactStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> Harness {
        let hits: Vec<(&str, f64)> = self.hits.iter().map(|(id, s)| (id.as_str(), *s)).collect();
        let search = Arc::new(ScriptedSearch::with_hits(&hits));
        let embedder = Arc::new(ScriptedEmbedder::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let directory = Arc::new(InMemoryDirectory::from_profiles(self.profiles));

        let collaborators = Collaborators {
            search: search.clone(),
            directory: directory.clone(),
            ledger: self.ledger.unwrap_or_else(|| ledger.clone()),
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(InMemoryArtifactStore::new())),
            embedder: embedder.clone(),
        };

        Harness {
            orchestrator: Arc::new(JobOrchestrator::new(collaborators, &self.config)),
            search,
            embedder,
            ledger,
            directory,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}

/// Defaults with a short collaborator timeout.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.collaborators.timeout_ms = 500;
    config
}
