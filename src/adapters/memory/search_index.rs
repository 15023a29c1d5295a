use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::{cosine_similarity, CounterpartyProfile, SearchHit};
use crate::domain::ports::{EmbeddingProvider, SearchIndex};

struct IndexedProfile {
    name: String,
    vector: Vec<f32>,
}

/// Similarity search over embedded counterparty profiles.
pub struct InMemorySearchIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<HashMap<String, IndexedProfile>>,
}

impl InMemorySearchIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Embed and index profiles, replacing any existing entry with the same id.
    pub async fn index_profiles(&self, profiles: &[CounterpartyProfile]) -> CollaboratorResult<()> {
        let texts: Vec<String> = profiles.iter().map(CounterpartyProfile::profile_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let mut entries = self.entries.write().await;
        for (profile, vector) in profiles.iter().zip(vectors) {
            entries.insert(
                profile.id.clone(),
                IndexedProfile {
                    name: profile.name.clone(),
                    vector,
                },
            );
        }
        tracing::debug!(indexed = profiles.len(), total = entries.len(), "profiles indexed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn search(&self, query: &str, limit: usize) -> CollaboratorResult<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query).await?;
        let entries = self.entries.read().await;

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|(id, entry)| {
                let mut hit = SearchHit::new(id.clone(), cosine_similarity(&query_vector, &entry.vector));
                hit.metadata.insert("name".to_string(), entry.name.clone());
                hit
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.counterparty_id.cmp(&b.counterparty_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::HashingEmbeddingProvider;

    fn profile(id: &str, skills: &[&str]) -> CounterpartyProfile {
        CounterpartyProfile {
            id: id.into(),
            name: id.into(),
            skills: skills.iter().map(ToString::to_string).collect(),
            experience: String::new(),
            hourly_rate: None,
            available: true,
            rating: None,
        }
    }

    #[tokio::test]
    async fn test_search_ranks_closest_profile_first() {
        let index = InMemorySearchIndex::new(Arc::new(HashingEmbeddingProvider::default()));
        index
            .index_profiles(&[
                profile("web", &["html", "css", "javascript", "landing", "page"]),
                profile("tax", &["accounting", "tax", "spreadsheets"]),
            ])
            .await
            .unwrap();

        let hits = index.search("landing page html css", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].counterparty_id, "web");
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].metadata.get("name").map(String::as_str), Some("web"));

        assert_eq!(index.search("landing page", 1).await.unwrap().len(), 1);
    }
}
