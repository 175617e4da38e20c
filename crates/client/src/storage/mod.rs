//! Durable on-device key-value cache.
//!
//! The cache stores small JSON documents under well-known keys:
//! `cart-<userId>` for the persisted cart, `orders-<userId>` for the last
//! fetched order list, and `user`/`token` for the session. The key space is
//! modeled as a typed enum so per-user partitioning is visible in the type
//! system rather than hidden in string concatenation.

mod fs;
mod memory;

use async_trait::async_trait;
use marketbag_core::UserId;

use crate::error::CacheError;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// A key in the durable cache.
///
/// Cart and order keys carry the owning user id; rendering them into the
/// historical string layout happens in exactly one place (`Display`), so no
/// code path can read another user's data by gluing strings together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Persisted cart for one user (`cart-<userId>`).
    Cart(UserId),
    /// Mirrored order list for one user (`orders-<userId>`).
    Orders(UserId),
    /// The signed-in user record (`user`).
    User,
    /// The bearer token (`token`).
    Token,
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cart(user) => write!(f, "cart-{user}"),
            Self::Orders(user) => write!(f, "orders-{user}"),
            Self::User => f.write_str("user"),
            Self::Token => f.write_str("token"),
        }
    }
}

/// Asynchronous durable key-value store holding JSON values.
///
/// Implementations must be safe to call concurrently; callers that need
/// read-modify-write atomicity serialize at a higher level (the cart
/// synchronizer's per-user lock).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &StorageKey) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &StorageKey, value: serde_json::Value) -> Result<(), CacheError>;

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    async fn remove(&self, key: &StorageKey) -> Result<(), CacheError>;
}

/// Read and deserialize a typed value from a store.
///
/// # Errors
///
/// Returns the underlying cache error, or a serialization error when the
/// stored JSON does not match `T`.
pub async fn get_typed<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &StorageKey,
) -> Result<Option<T>, CacheError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and store a typed value.
///
/// # Errors
///
/// Returns the underlying cache error or a serialization error.
pub async fn put_typed<T: serde::Serialize>(
    store: &dyn KeyValueStore,
    key: &StorageKey,
    value: &T,
) -> Result<(), CacheError> {
    store.put(key, serde_json::to_value(value)?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_the_on_device_layout() {
        let user = UserId::new("u-42");
        assert_eq!(StorageKey::Cart(user.clone()).to_string(), "cart-u-42");
        assert_eq!(StorageKey::Orders(user).to_string(), "orders-u-42");
        assert_eq!(StorageKey::User.to_string(), "user");
        assert_eq!(StorageKey::Token.to_string(), "token");
    }

    #[test]
    fn cart_keys_for_different_users_differ() {
        let a = StorageKey::Cart(UserId::new("a"));
        let b = StorageKey::Cart(UserId::new("b"));
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }
}
