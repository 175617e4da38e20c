//! In-memory durable-cache stand-in for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CacheError;

use super::{KeyValueStore, StorageKey};

/// In-memory [`KeyValueStore`].
///
/// `set_unavailable(true)` makes every operation fail with
/// [`CacheError::Unavailable`], for exercising the degraded-cache paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StorageKey) -> Result<Option<serde_json::Value>, CacheError> {
        self.check_available()?;
        Ok(self.entries.read().await.get(&key.to_string()).cloned())
    }

    async fn put(&self, key: &StorageKey, value: serde_json::Value) -> Result<(), CacheError> {
        self.check_available()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), CacheError> {
        self.check_available()?;
        self.entries.write().await.remove(&key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn round_trips_values() {
        let store = MemoryStore::new();
        store.put(&StorageKey::User, json!({"id": "u-1"})).await.unwrap();
        assert_eq!(
            store.get(&StorageKey::User).await.unwrap(),
            Some(json!({"id": "u-1"}))
        );
        store.remove(&StorageKey::User).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.get(&StorageKey::Token).await.is_err());
        assert!(store.put(&StorageKey::Token, json!("t")).await.is_err());
        assert!(store.remove(&StorageKey::Token).await.is_err());

        store.set_unavailable(false);
        assert!(store.get(&StorageKey::Token).await.unwrap().is_none());
    }
}
