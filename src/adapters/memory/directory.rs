use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::CollaboratorResult;
use crate::domain::models::CounterpartyProfile;
use crate::domain::ports::CounterpartyDirectory;

/// Counterparty profiles held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<String, CounterpartyProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = CounterpartyProfile>) -> Self {
        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }

    pub async fn insert(&self, profile: CounterpartyProfile) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }

    pub async fn profiles(&self) -> Vec<CounterpartyProfile> {
        let mut all: Vec<_> = self.profiles.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[async_trait]
impl CounterpartyDirectory for InMemoryDirectory {
    async fn get(&self, id: &str) -> CollaboratorResult<Option<CounterpartyProfile>> {
        Ok(self.profiles.read().await.get(id).cloned())
    }
}
