//! Generation history and favorites
//!
//! Every finished session is saved once as a `HistoryRecord`; a user can
//! later bookmark a record as a favorite.

use crate::errors::{BakeError, Result};
use crate::store::RecordId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Saved result of a finished generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub owner_id: String,

    /// What the user asked for (first form input)
    pub kind: String,

    pub result: String,
    pub created_at: DateTime<Utc>,
}

/// Bookmark of a history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub record_id: RecordId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator for finished generations
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Save a finished generation under a fresh random id
    async fn save(
        &self,
        owner_id: &str,
        input_description: &str,
        result_text: &str,
    ) -> Result<RecordId>;

    async fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>>;

    /// Records of one owner, newest first
    async fn list(&self, owner_id: &str) -> Result<Vec<HistoryRecord>>;
}

/// Favorite/bookmark collaborator
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Bookmark an existing record; bookmarking twice is a no-op
    async fn add_favorite(&self, record_id: RecordId, owner_email: &str) -> Result<()>;

    async fn favorites(&self, owner_email: &str) -> Result<Vec<Favorite>>;
}

/// Newest first, id as tie breaker
pub(crate) fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<RecordId, HistoryRecord>,
    favorites: Vec<Favorite>,
}

/// In-memory history and favorites
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved records
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn save(
        &self,
        owner_id: &str,
        input_description: &str,
        result_text: &str,
    ) -> Result<RecordId> {
        let mut inner = self.inner.write().await;

        let mut id = RecordId::random();
        while inner.records.contains_key(&id) {
            id = RecordId::random();
        }

        inner.records.insert(
            id,
            HistoryRecord {
                id,
                owner_id: owner_id.to_string(),
                kind: input_description.to_string(),
                result: result_text.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<HistoryRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<HistoryRecord> = inner
            .records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[async_trait]
impl FavoriteStore for MemoryStore {
    async fn add_favorite(&self, record_id: RecordId, owner_email: &str) -> Result<()> {
        let mut inner = self.inner.write().await;

        if !inner.records.contains_key(&record_id) {
            return Err(BakeError::NotFound(format!("Record {} not found", record_id)));
        }
        let exists = inner
            .favorites
            .iter()
            .any(|f| f.record_id == record_id && f.email == owner_email);
        if !exists {
            inner.favorites.push(Favorite {
                record_id,
                email: owner_email.to_string(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn favorites(&self, owner_email: &str) -> Result<Vec<Favorite>> {
        let inner = self.inner.read().await;
        Ok(inner
            .favorites
            .iter()
            .filter(|f| f.email == owner_email)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_get() {
        let store = MemoryStore::new();
        let id = store.save("user-1", "Retail stores", "<p>plan</p>").await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.owner_id, "user-1");
        assert_eq!(record.kind, "Retail stores");
        assert_eq!(record.result, "<p>plan</p>");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let store = MemoryStore::new();
        store.save("a", "one", "1").await.unwrap();
        store.save("b", "two", "2").await.unwrap();
        store.save("a", "three", "3").await.unwrap();

        let records = store.list("a").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.owner_id == "a"));
        assert!(records[0].created_at >= records[1].created_at);
    }

    #[tokio::test]
    async fn test_favorite_requires_existing_record() {
        let store = MemoryStore::new();
        let result = store.add_favorite(RecordId(1), "me@example.com").await;
        assert!(matches!(result, Err(BakeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_favorite_is_idempotent() {
        let store = MemoryStore::new();
        let id = store.save("a", "kind", "text").await.unwrap();

        store.add_favorite(id, "me@example.com").await.unwrap();
        store.add_favorite(id, "me@example.com").await.unwrap();
        store.add_favorite(id, "other@example.com").await.unwrap();

        let mine = store.favorites("me@example.com").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].record_id, id);
    }
}
