//! Quality validation stage: compare a delivered artifact to the job's
//! requirements by embedding similarity.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::{cosine_similarity, StageKind, ValidationResult};
use crate::domain::ports::{ArtifactStore, EmbeddingProvider};
use crate::services::collaborator::call_with_timeout;

pub struct QualityService {
    store: Arc<dyn ArtifactStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl QualityService {
    pub fn new(store: Arc<dyn ArtifactStore>, embedder: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self {
            store,
            embedder,
            timeout,
        }
    }

    /// Put the artifact into storage and return its id.
    pub async fn store_artifact(&self, bytes: Vec<u8>) -> CollaboratorResult<String> {
        let store = self.store.clone();
        call_with_timeout(StageKind::Validation, self.timeout, async move { store.store(bytes).await }).await
    }

    /// Validate a stored artifact against `requirements`.
    ///
    /// Always produces a result: a missing artifact or an embedding failure
    /// yields a failed result with zero similarity.
    #[tracing::instrument(skip(self, requirements))]
    pub async fn validate(
        &self,
        job_id: Uuid,
        requirements: &str,
        artifact_ref: Option<&str>,
        threshold: f64,
    ) -> ValidationResult {
        let owned_ref = artifact_ref.map(ToString::to_string);
        let Some(id) = artifact_ref else {
            return ValidationResult::unretrievable(job_id, None, threshold);
        };

        let store = self.store.clone();
        let fetch_id = id.to_string();
        let bytes = match call_with_timeout(StageKind::Validation, self.timeout, async move {
            store.retrieve(&fetch_id).await
        })
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "artifact retrieval failed");
                return ValidationResult::unretrievable(job_id, owned_ref, threshold);
            }
        };

        let artifact_text = String::from_utf8_lossy(&bytes).into_owned();
        let embedder = self.embedder.clone();
        let texts = vec![requirements.to_string(), artifact_text];
        let vectors = call_with_timeout(StageKind::Validation, self.timeout, async move {
            embedder.embed_batch(&texts).await
        })
        .await;

        match vectors {
            Ok(v) if v.len() == 2 => {
                let similarity = cosine_similarity(&v[0], &v[1]);
                let result = ValidationResult::new(job_id, owned_ref, similarity, threshold);
                tracing::info!(
                    similarity = result.similarity,
                    threshold,
                    passed = result.passed,
                    "artifact validated"
                );
                result
            }
            Ok(v) => {
                tracing::warn!(vectors = v.len(), "embedding provider returned wrong vector count");
                ValidationResult::not_evaluated(
                    job_id,
                    owned_ref,
                    threshold,
                    "Similarity could not be computed.",
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed during validation");
                ValidationResult::not_evaluated(
                    job_id,
                    owned_ref,
                    threshold,
                    format!("Similarity could not be computed: {e}"),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CollaboratorError;
    use crate::domain::models::validation::UNRETRIEVABLE_FEEDBACK;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, Vec<u8>>>);

    #[async_trait]
    impl ArtifactStore for MapStore {
        async fn store(&self, bytes: Vec<u8>) -> CollaboratorResult<String> {
            let mut map = self.0.lock().await;
            let id = format!("a{}", map.len());
            map.insert(id.clone(), bytes);
            Ok(id)
        }

        async fn retrieve(&self, artifact_id: &str) -> CollaboratorResult<Vec<u8>> {
            self.0
                .lock()
                .await
                .get(artifact_id)
                .cloned()
                .ok_or_else(|| CollaboratorError::NotFound(artifact_id.to_string()))
        }
    }

    /// Maps the requirements text to `[1, 0]` and anything else to a vector
    /// at a fixed cosine from it.
    struct AngleEmbedder {
        requirements: String,
        cosine: f32,
    }

    #[async_trait]
    impl EmbeddingProvider for AngleEmbedder {
        fn name(&self) -> &'static str {
            "angle"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> CollaboratorResult<Vec<f32>> {
            if text == self.requirements {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![self.cosine, (1.0 - self.cosine * self.cosine).sqrt()])
            }
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        fn name(&self) -> &'static str {
            "down"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> CollaboratorResult<Vec<f32>> {
            Err(CollaboratorError::Unavailable("no model".into()))
        }
    }

    fn service(cosine: f32) -> QualityService {
        QualityService::new(
            Arc::new(MapStore::default()),
            Arc::new(AngleEmbedder {
                requirements: "reqs".into(),
                cosine,
            }),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_high_similarity_passes() {
        let svc = service(0.92);
        let id = svc.store_artifact(b"deliverable".to_vec()).await.unwrap();
        let result = svc.validate(Uuid::nil(), "reqs", Some(&id), 0.8).await;
        assert!(result.passed);
        assert!((result.similarity - 0.92).abs() < 1e-4);
        assert_eq!(result.artifact_ref.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_low_similarity_fails() {
        let svc = service(0.5);
        let id = svc.store_artifact(b"off topic".to_vec()).await.unwrap();
        let result = svc.validate(Uuid::nil(), "reqs", Some(&id), 0.8).await;
        assert!(!result.passed);
        assert!(result.evaluated);
        assert!(result.feedback.ends_with("Needs revision."));
    }

    #[tokio::test]
    async fn test_missing_artifact_yields_failed_result() {
        let svc = service(0.99);
        let result = svc.validate(Uuid::nil(), "reqs", Some("nope"), 0.8).await;
        assert!(!result.passed);
        assert!(result.similarity.abs() < f64::EPSILON);
        assert_eq!(result.feedback, UNRETRIEVABLE_FEEDBACK);

        let result = svc.validate(Uuid::nil(), "reqs", None, 0.8).await;
        assert_eq!(result.feedback, UNRETRIEVABLE_FEEDBACK);
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_failed_result() {
        let store = Arc::new(MapStore::default());
        let id = store.store(b"x".to_vec()).await.unwrap();
        let svc = QualityService::new(store, Arc::new(DownEmbedder), Duration::from_secs(1));
        let result = svc.validate(Uuid::nil(), "reqs", Some(&id), 0.8).await;
        assert!(!result.passed);
        assert!(!result.evaluated);
        assert!(result.feedback.starts_with("Similarity could not be computed"));
    }
}
