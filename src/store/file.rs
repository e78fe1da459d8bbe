//! JSON-file history store
//!
//! One `record_<id>.json` per generation plus a single `favorites.json`,
//! under `~/.promptbake/history` by default.

use crate::errors::{BakeError, Result};
use crate::store::history::{sort_newest_first, Favorite, FavoriteStore, HistoryRecord, HistoryStore};
use crate::store::RecordId;
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Default number of records kept on disk
pub const DEFAULT_MAX_RECORDS: usize = 500;

const FAVORITES_FILE: &str = "favorites.json";

/// History and favorites persisted as JSON files
pub struct FileStore {
    dir: PathBuf,
    max_records: usize,

    /// Serializes read-modify-write of the favorites file
    favorites_lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create) a store directory
    pub fn new(dir: impl Into<PathBuf>, max_records: usize) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                BakeError::Persistence(format!("Failed to create history directory: {}", e))
            })?;
        }

        Ok(Self {
            dir,
            max_records: max_records.max(1),
            favorites_lock: Mutex::new(()),
        })
    }

    /// Default location under the home directory
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptbake")
            .join("history")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: RecordId) -> PathBuf {
        self.dir.join(format!("record_{}.json", id))
    }

    /// Ids of all records on disk
    pub fn list_ids(&self) -> Result<Vec<RecordId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(id) = filename
                    .strip_prefix("record_")
                    .and_then(|rest| rest.strip_suffix(".json"))
                    .and_then(|id| id.parse().ok())
                {
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }

    fn load_record(&self, id: RecordId) -> Result<Option<HistoryRecord>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn load_all(&self) -> Result<Vec<HistoryRecord>> {
        let mut records = Vec::new();
        for id in self.list_ids()? {
            match self.load_record(id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to load history record {}: {}", id, e),
            }
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Delete a record file
    pub fn delete(&self, id: RecordId) -> Result<()> {
        let path = self.record_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Keep only the `max_records` most recent records
    fn cleanup_old_records(&self) -> Result<()> {
        let records = self.load_all()?;
        for record in records.iter().skip(self.max_records) {
            if let Err(e) = self.delete(record.id) {
                tracing::warn!("Failed to delete old record {}: {}", record.id, e);
            }
        }
        Ok(())
    }

    fn load_favorites(&self) -> Result<Vec<Favorite>> {
        let path = self.dir.join(FAVORITES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[async_trait]
impl HistoryStore for FileStore {
    async fn save(
        &self,
        owner_id: &str,
        input_description: &str,
        result_text: &str,
    ) -> Result<RecordId> {
        let mut id = RecordId::random();
        while self.record_path(id).exists() {
            id = RecordId::random();
        }

        let record = HistoryRecord {
            id,
            owner_id: owner_id.to_string(),
            kind: input_description.to_string(),
            result: result_text.to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&record)?;
        fs::write(self.record_path(id), json)
            .map_err(|e| BakeError::Persistence(format!("Failed to write record {}: {}", id, e)))?;

        // the record is already on disk, so pruning trouble must not fail the save
        if let Err(e) = self.cleanup_old_records() {
            tracing::warn!("Failed to prune history after saving {}: {}", id, e);
        }
        Ok(id)
    }

    async fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>> {
        self.load_record(id)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect())
    }
}

#[async_trait]
impl FavoriteStore for FileStore {
    async fn add_favorite(&self, record_id: RecordId, owner_email: &str) -> Result<()> {
        let _guard = self.favorites_lock.lock().await;

        if !self.record_path(record_id).exists() {
            return Err(BakeError::NotFound(format!("Record {} not found", record_id)));
        }

        let mut favorites = self.load_favorites()?;
        if favorites
            .iter()
            .any(|f| f.record_id == record_id && f.email == owner_email)
        {
            return Ok(());
        }

        favorites.push(Favorite {
            record_id,
            email: owner_email.to_string(),
            created_at: Utc::now(),
        });

        let json = serde_json::to_string_pretty(&favorites)?;
        fs::write(self.dir.join(FAVORITES_FILE), json)
            .map_err(|e| BakeError::Persistence(format!("Failed to write favorites: {}", e)))?;
        Ok(())
    }

    async fn favorites(&self, owner_email: &str) -> Result<Vec<Favorite>> {
        Ok(self
            .load_favorites()?
            .into_iter()
            .filter(|f| f.email == owner_email)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store(max_records: usize) -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("history"), max_records).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_store_creation() {
        let (store, _temp) = create_test_store(10);
        assert!(store.dir().exists());
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_record() {
        let (store, _temp) = create_test_store(10);
        let id = store.save("owner", "Retail", "<h1>Plan</h1>").await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.kind, "Retail");
        assert_eq!(loaded.result, "<h1>Plan</h1>");
        assert!(store.get(RecordId(id.0 ^ 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let (store, _temp) = create_test_store(10);
        store.save("a", "1", "x").await.unwrap();
        store.save("b", "2", "y").await.unwrap();
        store.save("a", "3", "z").await.unwrap();

        assert_eq!(store.list("a").await.unwrap().len(), 2);
        assert_eq!(store.list("b").await.unwrap().len(), 1);
        assert!(store.list("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_most_recent() {
        let (store, _temp) = create_test_store(2);
        for i in 0..4 {
            store.save("a", &i.to_string(), "text").await.unwrap();
        }
        assert_eq!(store.list_ids().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_succeeds_when_old_records_cannot_be_pruned() {
        let (store, _temp) = create_test_store(1);
        fs::write(store.record_path(RecordId(7)), "not json").unwrap();

        let id = store.save("a", "kind", "text").await.unwrap();
        assert_ne!(id, RecordId(7));
        assert_eq!(store.get(id).await.unwrap().unwrap().result, "text");
        assert_eq!(store.list_ids().unwrap().len(), 2);
        store.add_favorite(id, "me@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_favorites_round_trip_through_disk() {
        let (store, temp) = create_test_store(10);
        let id = store.save("a", "kind", "text").await.unwrap();
        store.add_favorite(id, "me@example.com").await.unwrap();
        store.add_favorite(id, "me@example.com").await.unwrap();

        let reopened = FileStore::new(temp.path().join("history"), 10).unwrap();
        let favorites = reopened.favorites("me@example.com").await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].record_id, id);

        let missing = reopened.add_favorite(RecordId(id.0 ^ 1), "me@example.com").await;
        assert!(matches!(missing, Err(BakeError::NotFound(_))));
    }
}
