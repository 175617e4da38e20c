//! Integration tests for the Marketbag synchronization core.
//!
//! Every test wires a full [`StoreContext`] over the in-memory durable
//! cache and the scripted collaborators from `marketbag_client::testkit`,
//! then drives it through the public operations only, without reaching into
//! internals.
//!
//! # Test Categories
//!
//! - `cart_flow` - Synchronizer operations, coherence, checkout atomicity
//! - `order_flow` - Order lifecycle transitions and bucket counts
//! - `isolation` - Per-user partitioning and sign-out behavior

use std::sync::Arc;

use marketbag_client::StoreContext;
use marketbag_client::services::{CartApi, CatalogApi, OrderApi};
use marketbag_client::storage::{KeyValueStore, MemoryStore};
use marketbag_client::testkit::{ScriptedCartService, ScriptedCatalog, ScriptedOrderService};
use marketbag_core::{Session, User, UserId};

/// A context plus handles to its scripted collaborators.
pub struct TestHarness {
    pub storage: Arc<MemoryStore>,
    pub catalog: Arc<ScriptedCatalog>,
    pub remote: Arc<ScriptedCartService>,
    pub orders: Arc<ScriptedOrderService>,
    pub context: StoreContext,
}

impl TestHarness {
    /// Build a harness for `user_id` over fresh storage and a small
    /// three-product catalog.
    #[must_use]
    pub fn new(user_id: &str) -> Self {
        Self::over_storage(user_id, Arc::new(MemoryStore::new()))
    }

    /// Build a harness for `user_id` sharing existing storage, for
    /// cross-session and cross-user scenarios.
    #[must_use]
    pub fn over_storage(user_id: &str, storage: Arc<MemoryStore>) -> Self {
        let catalog = Arc::new(ScriptedCatalog::with_products([
            ("p1", "Mens Cotton Jacket", 5599),
            ("p2", "Fjallraven Backpack", 10995),
            ("p3", "Gold Petite Micropave", 16800),
        ]));
        let remote = Arc::new(ScriptedCartService::new());
        let orders = Arc::new(ScriptedOrderService::new());

        let context = StoreContext::with_collaborators(
            session(user_id),
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
            Arc::clone(&catalog) as Arc<dyn CatalogApi>,
            Arc::clone(&remote) as Arc<dyn CartApi>,
            Arc::clone(&orders) as Arc<dyn OrderApi>,
        );

        Self {
            storage,
            catalog,
            remote,
            orders,
            context,
        }
    }
}

/// A session for tests; the token is an arbitrary opaque string.
#[must_use]
pub fn session(user_id: &str) -> Session {
    Session::new(
        format!("token-{user_id}"),
        User {
            id: UserId::new(user_id),
            name: format!("User {user_id}"),
            email: format!("{user_id}@example.com"),
        },
    )
}
