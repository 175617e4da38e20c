//! Session persistence under the `user` and `token` keys.
//!
//! Token issuance is the auth backend's job; this module only round-trips
//! the issued session through the durable cache so the app can restore it
//! on launch and drop it on sign-out.

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::instrument;

use marketbag_core::{Session, User};

use crate::error::CacheError;
use crate::storage::{KeyValueStore, StorageKey, get_typed};

/// Persist a session.
///
/// # Errors
///
/// Returns the cache error; a partially written session (user without
/// token) is treated as signed-out by [`load`].
#[instrument(skip_all, fields(user = %session.user_id()))]
pub async fn save(store: &dyn KeyValueStore, session: &Session) -> Result<(), CacheError> {
    store
        .put(&StorageKey::User, serde_json::to_value(&session.user)?)
        .await?;
    store
        .put(&StorageKey::Token, json!(session.token.expose_secret()))
        .await
}

/// Restore the persisted session, if both halves are present.
///
/// # Errors
///
/// Returns the cache error for I/O failures; missing keys are `Ok(None)`.
pub async fn load(store: &dyn KeyValueStore) -> Result<Option<Session>, CacheError> {
    let Some(user) = get_typed::<User>(store, &StorageKey::User).await? else {
        return Ok(None);
    };
    let Some(token) = get_typed::<String>(store, &StorageKey::Token).await? else {
        return Ok(None);
    };
    Ok(Some(Session::new(token, user)))
}

/// Remove the persisted session. The user's cart stays persisted so it is
/// still there when they sign back in.
///
/// # Errors
///
/// Returns the cache error; both keys are attempted.
#[instrument(skip_all)]
pub async fn clear(store: &dyn KeyValueStore) -> Result<(), CacheError> {
    let user = store.remove(&StorageKey::User).await;
    let token = store.remove(&StorageKey::Token).await;
    user.and(token)
}

#[cfg(test)]
mod tests {
    use marketbag_core::UserId;

    use crate::storage::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(
            "bearer-abc",
            User {
                id: UserId::new("u-1"),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn round_trips_a_session() {
        let store = MemoryStore::new();
        save(&store, &session()).await.unwrap();

        let restored = load(&store).await.unwrap().unwrap();
        assert_eq!(restored.user_id(), &UserId::new("u-1"));
        assert_eq!(restored.token.expose_secret(), "bearer-abc");
    }

    #[tokio::test]
    async fn missing_token_means_signed_out() {
        let store = MemoryStore::new();
        save(&store, &session()).await.unwrap();
        store.remove(&StorageKey::Token).await.unwrap();

        assert!(load(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_both_keys() {
        let store = MemoryStore::new();
        save(&store, &session()).await.unwrap();
        clear(&store).await.unwrap();
        assert!(store.is_empty().await);
    }
}
