//! Per-session wiring of the synchronization core.
//!
//! A [`StoreContext`] is created at login (or restored at launch) and owns
//! everything scoped to that user: the durable cache handle, the cart
//! synchronizer with its reactive store, and the order lifecycle manager.
//! There is no ambient global state; presentation layers hold the context
//! and drop it at sign-out, which also resets the in-memory stores so a
//! following login cannot observe the previous user's cart.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use marketbag_core::{OrderId, Session, UserId};

use crate::cart::{CartAction, CartStore, CartSynchronizer};
use crate::config::ClientConfig;
use crate::error::{CacheError, CartError};
use crate::orders::OrderLifecycle;
use crate::services::{
    CartApi, CatalogApi, CatalogClient, OrderApi, OrderClient, RemoteCartClient,
};
use crate::session;
use crate::storage::{FsStore, KeyValueStore};

/// Failure opening or restoring a context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One signed-in user's synchronization core.
pub struct StoreContext {
    session: Session,
    storage: Arc<dyn KeyValueStore>,
    cart: CartSynchronizer,
    orders: OrderLifecycle,
}

impl StoreContext {
    /// Open a context for a freshly issued session, persisting it so it can
    /// be restored on the next launch.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the session
    /// cannot be persisted.
    pub async fn open(config: &ClientConfig, session: Session) -> Result<Self, ContextError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FsStore::new(config.data_dir.clone()));
        session::save(storage.as_ref(), &session).await?;
        Self::connect(config, session, storage)
    }

    /// Restore the context persisted by a previous launch, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the durable
    /// cache cannot be read.
    pub async fn resume(config: &ClientConfig) -> Result<Option<Self>, ContextError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FsStore::new(config.data_dir.clone()));
        match session::load(storage.as_ref()).await? {
            Some(session) => Self::connect(config, session, storage).map(Some),
            None => Ok(None),
        }
    }

    fn connect(
        config: &ClientConfig,
        session: Session,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ContextError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let catalog: Arc<dyn CatalogApi> = Arc::new(CatalogClient::new(config, client.clone()));
        let remote: Arc<dyn CartApi> = Arc::new(RemoteCartClient::new(
            config,
            client.clone(),
            session.token.clone(),
        ));
        let orders: Arc<dyn OrderApi> =
            Arc::new(OrderClient::new(config, client, session.token.clone()));
        Ok(Self::with_collaborators(
            session, storage, catalog, remote, orders,
        ))
    }

    /// Assemble a context from explicit collaborators (the injection seam
    /// used by tests and by callers with their own clients).
    #[must_use]
    pub fn with_collaborators(
        session: Session,
        storage: Arc<dyn KeyValueStore>,
        catalog: Arc<dyn CatalogApi>,
        remote: Arc<dyn CartApi>,
        order_api: Arc<dyn OrderApi>,
    ) -> Self {
        let user_id = session.user_id().clone();
        let cart = CartSynchronizer::new(
            user_id.clone(),
            Arc::clone(&storage),
            catalog,
            remote,
            Arc::clone(&order_api),
            CartStore::new(),
            Arc::new(Mutex::new(())),
        );
        let orders = OrderLifecycle::new(user_id, order_api, Arc::clone(&storage));
        Self {
            session,
            storage,
            cart,
            orders,
        }
    }

    /// The session this context is scoped to.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Id of the signed-in user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        self.session.user_id()
    }

    /// The cart synchronizer.
    #[must_use]
    pub const fn cart(&self) -> &CartSynchronizer {
        &self.cart
    }

    /// The order lifecycle manager.
    #[must_use]
    pub const fn orders(&self) -> &OrderLifecycle {
        &self.orders
    }

    /// Check out the current cart, then refresh the order list so the new
    /// order appears in its bucket.
    ///
    /// # Errors
    ///
    /// Propagates [`CartError`] from the checkout itself; a failed order
    /// refresh afterwards is logged but does not fail the checkout, which
    /// has already happened.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn checkout(&self) -> Result<OrderId, CartError> {
        let order_id = self.cart.checkout().await?;
        if let Err(err) = self.orders.refresh().await {
            warn!(error = %err, "order refresh after checkout failed");
        }
        Ok(order_id)
    }

    /// Tear the context down: reset the in-memory cart and remove the
    /// persisted session. The user's durable cart is kept for their next
    /// sign-in; no other user's keys are touched.
    ///
    /// # Errors
    ///
    /// Returns the cache error when the session keys cannot be removed.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn sign_out(self) -> Result<(), CacheError> {
        self.cart.store().apply(&CartAction::Clear);
        session::clear(self.storage.as_ref()).await?;
        info!("signed out");
        Ok(())
    }
}
