//! Filesystem-backed durable cache.
//!
//! One JSON file per key under the configured data directory. Key strings
//! are base64url-encoded in file names because user ids are opaque and may
//! contain path separators.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::instrument;

use crate::error::CacheError;

use super::{KeyValueStore, StorageKey};

/// Durable cache storing each key as a JSON file.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &StorageKey) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key.to_string());
        self.dir.join(format!("{encoded}.json"))
    }

    /// Root directory of this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl KeyValueStore for FsStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &StorageKey) -> Result<Option<serde_json::Value>, CacheError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    #[instrument(skip(self, value), fields(key = %key))]
    async fn put(&self, key: &StorageKey, value: serde_json::Value) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let text = serde_json::to_string(&value)?;

        // Write-then-rename so a crash mid-write cannot leave a truncated
        // document under the live key.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn remove(&self, key: &StorageKey) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use marketbag_core::UserId;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = StorageKey::Cart(UserId::new("u-1"));

        assert!(store.get(&key).await.unwrap().is_none());

        let value = json!({"p1": {"quantity": 2}});
        store.put(&key, value.clone()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(value));

        store.remove(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn removing_absent_key_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.remove(&StorageKey::Token).await.unwrap();
    }

    #[tokio::test]
    async fn keys_with_awkward_user_ids_stay_on_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = StorageKey::Cart(UserId::new("../evil/../user"));

        store.put(&key, json!({})).await.unwrap();

        // Everything must land inside the data dir.
        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        assert!(entries.next().is_some());
        assert!(entries.next().is_none());
    }
}
