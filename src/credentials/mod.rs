//! Durable mapping from user id to OAuth token pair.
//!
//! The whole map is mirrored in memory and rewritten to a single JSON file
//! after every mutation. Mutations are serialized by `write_lock`, which is
//! held across both the in-memory change and the file rewrite, so the file
//! always reflects the last completed mutation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::{RelayError, RelayResult};

/// OAuth token pair for one user, as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialRecord {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

pub struct CredentialStore {
    path: PathBuf,
    records: RwLock<HashMap<String, CredentialRecord>>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Create an empty store backed by `path` without touching the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Open the store, reading existing records from `path`.
    ///
    /// A missing file yields an empty store. Unreadable or malformed files are
    /// logged and also yield an empty store; startup never fails here.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        match read_records(&store.path).await {
            Ok(Some(records)) => {
                info!(
                    "Loaded {} credential records from {}",
                    records.len(),
                    store.path.display()
                );
                *store.records.write().await = records;
            }
            Ok(None) => {
                debug!(
                    "Credential file {} not found, starting empty",
                    store.path.display()
                );
            }
            Err(e) => {
                error!(
                    "Failed to load credentials from {}: {}",
                    store.path.display(),
                    e
                );
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, user_id: &str) -> Option<CredentialRecord> {
        self.records.read().await.get(user_id).cloned()
    }

    pub async fn has(&self, user_id: &str) -> bool {
        self.records.read().await.contains_key(user_id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Point-in-time copy of every record, used by the refresh job.
    pub async fn entries(&self) -> Vec<(String, CredentialRecord)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(user_id, record)| (user_id.clone(), record.clone()))
            .collect()
    }

    /// Upsert a record and persist the full store before returning.
    ///
    /// On a persistence failure the in-memory record is kept and the error is
    /// returned so the caller can decide how loudly to report it.
    pub async fn set(&self, user_id: &str, record: CredentialRecord) -> RelayResult<()> {
        let _guard = self.write_lock.lock().await;
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record);
        self.persist().await
    }

    /// Remove a record and persist. Returns whether a record existed.
    pub async fn delete(&self, user_id: &str) -> RelayResult<bool> {
        let _guard = self.write_lock.lock().await;
        let removed = self.records.write().await.remove(user_id).is_some();
        self.persist().await?;
        Ok(removed)
    }

    /// Replace the record only if its refresh token is still `expected_refresh_token`.
    ///
    /// Returns `Ok(false)` without writing when the record was removed or
    /// re-authorized after the caller read it.
    pub async fn replace_if_current(
        &self,
        user_id: &str,
        expected_refresh_token: &str,
        record: CredentialRecord,
    ) -> RelayResult<bool> {
        let _guard = self.write_lock.lock().await;
        {
            let mut records = self.records.write().await;
            match records.get_mut(user_id) {
                Some(current) if current.refresh_token == expected_refresh_token => {
                    *current = record;
                }
                _ => return Ok(false),
            }
        }
        self.persist().await?;
        Ok(true)
    }

    /// Delete the record only if its refresh token is still `expected_refresh_token`.
    pub async fn delete_if_current(
        &self,
        user_id: &str,
        expected_refresh_token: &str,
    ) -> RelayResult<bool> {
        let _guard = self.write_lock.lock().await;
        {
            let mut records = self.records.write().await;
            match records.get(user_id) {
                Some(current) if current.refresh_token == expected_refresh_token => {
                    records.remove(user_id);
                }
                _ => return Ok(false),
            }
        }
        self.persist().await?;
        Ok(true)
    }

    // Callers must hold `write_lock`.
    async fn persist(&self) -> RelayResult<()> {
        let data = {
            let records = self.records.read().await;
            serde_json::to_vec_pretty(&*records)
                .map_err(|e| RelayError::Persistence(e.to_string()))?
        };

        write_atomically(&self.path, &data).await.map_err(|e| {
            error!(
                "Failed to save credentials to {}: {}",
                self.path.display(),
                e
            );
            RelayError::Persistence(e.to_string())
        })?;

        debug!("Credentials saved to {}", self.path.display());
        Ok(())
    }
}

async fn read_records(path: &Path) -> Result<Option<HashMap<String, CredentialRecord>>, String> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| e.to_string())
}

async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tokens_path(dir: &TempDir) -> PathBuf {
        dir.path().join("tokens.json")
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::load(tokens_path(&dir)).await;

        let record = CredentialRecord::new("access-1", "refresh-1");
        store.set("42", record.clone()).await.unwrap();

        assert_eq!(store.get("42").await, Some(record));
        assert!(store.has("42").await);
        assert!(!store.has("43").await);
        assert_eq!(store.get("43").await, None);
    }

    #[tokio::test]
    async fn test_delete_then_has_is_false() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::load(tokens_path(&dir)).await;

        store
            .set("42", CredentialRecord::new("a", "r"))
            .await
            .unwrap();
        assert!(store.delete("42").await.unwrap());
        assert!(!store.has("42").await);

        // deleting again is not an error
        assert!(!store.delete("42").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reload() {
        let dir = TempDir::new().unwrap();
        let path = tokens_path(&dir);

        let record = CredentialRecord::new("access-1", "refresh-1");
        {
            let store = CredentialStore::load(&path).await;
            store.set("42", record.clone()).await.unwrap();
            store
                .set("7", CredentialRecord::new("a7", "r7"))
                .await
                .unwrap();
            store.delete("7").await.unwrap();
        }

        let reloaded = CredentialStore::load(&path).await;
        assert_eq!(reloaded.get("42").await, Some(record));
        assert!(!reloaded.has("7").await);
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_file_layout_uses_camel_case_fields() {
        let dir = TempDir::new().unwrap();
        let path = tokens_path(&dir);
        let store = CredentialStore::load(&path).await;
        store
            .set("42", CredentialRecord::new("acc", "ref"))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["42"]["accessToken"], "acc");
        assert_eq!(raw["42"]["refreshToken"], "ref");
    }

    #[tokio::test]
    async fn test_load_reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = tokens_path(&dir);
        std::fs::write(
            &path,
            r#"{"42": {"accessToken": "acc", "refreshToken": "ref"}}"#,
        )
        .unwrap();

        let store = CredentialStore::load(&path).await;
        assert_eq!(
            store.get("42").await,
            Some(CredentialRecord::new("acc", "ref"))
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::load(tokens_path(&dir)).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = tokens_path(&dir);
        std::fs::write(&path, "{not json").unwrap();

        let store = CredentialStore::load(&path).await;
        assert!(store.is_empty().await);

        // the store stays usable and overwrites the broken file
        store
            .set("1", CredentialRecord::new("a", "r"))
            .await
            .unwrap();
        let reloaded = CredentialStore::load(&path).await;
        assert!(reloaded.has("1").await);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("tokens.json");
        let store = CredentialStore::load(&path).await;

        let result = store.set("42", CredentialRecord::new("a", "r")).await;
        assert!(matches!(result, Err(RelayError::Persistence(_))));
        assert!(store.has("42").await);
    }

    #[tokio::test]
    async fn test_replace_if_current() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::load(tokens_path(&dir)).await;
        store
            .set("42", CredentialRecord::new("old", "refresh-1"))
            .await
            .unwrap();

        let replaced = store
            .replace_if_current("42", "refresh-1", CredentialRecord::new("new", "refresh-1"))
            .await
            .unwrap();
        assert!(replaced);
        assert_eq!(store.get("42").await.unwrap().access_token, "new");

        // user re-authorized in between: stale write is dropped
        store
            .set("42", CredentialRecord::new("fresh", "refresh-2"))
            .await
            .unwrap();
        let replaced = store
            .replace_if_current("42", "refresh-1", CredentialRecord::new("stale", "refresh-1"))
            .await
            .unwrap();
        assert!(!replaced);
        assert_eq!(
            store.get("42").await,
            Some(CredentialRecord::new("fresh", "refresh-2"))
        );

        // missing user is never recreated
        let replaced = store
            .replace_if_current("99", "x", CredentialRecord::new("a", "x"))
            .await
            .unwrap();
        assert!(!replaced);
        assert!(!store.has("99").await);
    }

    #[tokio::test]
    async fn test_delete_if_current() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::load(tokens_path(&dir)).await;
        store
            .set("42", CredentialRecord::new("a", "refresh-2"))
            .await
            .unwrap();

        assert!(!store.delete_if_current("42", "refresh-1").await.unwrap());
        assert!(store.has("42").await);

        assert!(store.delete_if_current("42", "refresh-2").await.unwrap());
        assert!(!store.has("42").await);
    }

    #[tokio::test]
    async fn test_entries_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::load(tokens_path(&dir)).await;
        store.set("1", CredentialRecord::new("a1", "r1")).await.unwrap();
        store.set("2", CredentialRecord::new("a2", "r2")).await.unwrap();

        let mut entries = store.entries().await;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "1");
        assert_eq!(entries[1].1.refresh_token, "r2");
    }
}
