//! Cart synchronizer: the single writer for one user's cart.
//!
//! Keeps three representations convergent:
//! durable cache (`cart-<userId>`) → reactive store → remote cart service.
//! The durable cache is the local source of truth; the remote cart is
//! eventually consistent and a failed push never rolls back a local
//! mutation.
//!
//! Every read-modify-write cycle against the durable cart runs under a
//! per-user async lock. Without it, two overlapping increments both read
//! quantity 1 and both write 2; with it, the second cycle starts only after
//! the first write-back completes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use marketbag_core::{
    CartLine, CartSnapshot, OrderId, OrderLine, PersistedCart, PersistedLine, ProductId, UserId,
};

use crate::error::CartError;
use crate::services::{CartApi, CatalogApi, OrderApi, OrderDraft, RemoteCartLine};
use crate::storage::{KeyValueStore, StorageKey, get_typed, put_typed};

use super::store::{CartAction, CartStore};

/// Reconciles the durable cart cache, the reactive store, and the remote
/// cart service for one user.
pub struct CartSynchronizer {
    user_id: UserId,
    storage: Arc<dyn KeyValueStore>,
    catalog: Arc<dyn CatalogApi>,
    remote: Arc<dyn CartApi>,
    orders: Arc<dyn OrderApi>,
    store: CartStore,
    /// Serializes read-modify-write cycles on this user's persisted cart.
    gate: Arc<Mutex<()>>,
    /// Bumped by every applied mutation; a reconciliation started under an
    /// older generation is discarded instead of clobbering newer state.
    generation: AtomicU64,
}

impl CartSynchronizer {
    /// Create a synchronizer for `user_id`.
    ///
    /// `gate` comes from the owning context so every synchronizer for the
    /// same user shares one lock.
    #[must_use]
    pub fn new(
        user_id: UserId,
        storage: Arc<dyn KeyValueStore>,
        catalog: Arc<dyn CatalogApi>,
        remote: Arc<dyn CartApi>,
        orders: Arc<dyn OrderApi>,
        store: CartStore,
        gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            user_id,
            storage,
            catalog,
            remote,
            orders,
            store,
            gate,
            generation: AtomicU64::new(0),
        }
    }

    /// The reactive store this synchronizer publishes to.
    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    fn cart_key(&self) -> StorageKey {
        StorageKey::Cart(self.user_id.clone())
    }

    /// Read the persisted cart, degrading to empty when the cache fails.
    async fn read_persisted(&self) -> PersistedCart {
        match get_typed::<PersistedCart>(self.storage.as_ref(), &self.cart_key()).await {
            Ok(Some(cart)) => cart,
            Ok(None) => PersistedCart::empty(),
            Err(err) => {
                warn!(error = %err, "durable cart read failed, treating as empty");
                PersistedCart::empty()
            }
        }
    }

    /// Write the persisted cart back, warning instead of failing so the UI
    /// stays responsive when the cache is unavailable.
    async fn write_persisted(&self, cart: &PersistedCart) {
        if let Err(err) = put_typed(self.storage.as_ref(), &self.cart_key(), cart).await {
            warn!(error = %err, "durable cart write failed, in-memory state is ahead");
        }
    }

    /// Push the given snapshot to the remote cart service, best effort.
    async fn push_remote(&self, snapshot: &CartSnapshot) {
        let items: Vec<RemoteCartLine> =
            snapshot.lines.iter().map(RemoteCartLine::from).collect();
        if let Err(err) = self.remote.replace(&items).await {
            warn!(error = %err, "remote cart sync failed, local state remains authoritative");
        }
    }

    /// Add `quantity_delta` units of a product.
    ///
    /// An existing line accumulates; a new line fetches its display fields
    /// from the catalog first. A zero delta is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Catalog`] when a brand-new line's product data
    /// cannot be resolved; nothing is stored in that case.
    #[instrument(skip(self), fields(user = %self.user_id, product = %product_id))]
    pub async fn add(
        &self,
        product_id: &ProductId,
        quantity_delta: u32,
    ) -> Result<CartSnapshot, CartError> {
        if quantity_delta == 0 {
            return Ok(self.store.snapshot());
        }

        let _gate = self.gate.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut persisted = self.read_persisted().await;
        let line = if persisted.merge(product_id, quantity_delta) {
            merge_line(&persisted, &self.store.snapshot(), product_id)
                .ok_or_else(|| CartError::UnknownProduct(product_id.clone()))?
        } else {
            let product = self.catalog.product(product_id).await?;
            persisted.insert(
                product_id.clone(),
                PersistedLine {
                    quantity: quantity_delta,
                    title: product.title.clone(),
                    price: product.price,
                    image: product.image.clone(),
                },
            );
            CartLine {
                product_id: product_id.clone(),
                title: product.title,
                price: product.price,
                quantity: quantity_delta,
                image: product.image,
            }
        };

        self.write_persisted(&persisted).await;
        Ok(self.store.apply(&CartAction::Merge { line }))
    }

    /// Add one unit of a product already in the cart, then sync the remote
    /// cart best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownProduct`] when the product has no line.
    #[instrument(skip(self), fields(user = %self.user_id, product = %product_id))]
    pub async fn increment(&self, product_id: &ProductId) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut persisted = self.read_persisted().await;
        if !persisted.merge(product_id, 1) {
            return Err(CartError::UnknownProduct(product_id.clone()));
        }
        let line = merge_line(&persisted, &self.store.snapshot(), product_id)
            .ok_or_else(|| CartError::UnknownProduct(product_id.clone()))?;
        self.write_persisted(&persisted).await;
        let snapshot = self.store.apply(&CartAction::Merge { line });

        // Pushed while still holding the gate so overlapping mutations
        // cannot land their payloads out of order.
        self.push_remote(&snapshot).await;
        Ok(snapshot)
    }

    /// Remove one unit of a product; the line is deleted when its quantity
    /// reaches zero. The remote cart is synced best-effort afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownProduct`] when the product has no line.
    #[instrument(skip(self), fields(user = %self.user_id, product = %product_id))]
    pub async fn decrement(&self, product_id: &ProductId) -> Result<CartSnapshot, CartError> {
        let _gate = self.gate.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut persisted = self.read_persisted().await;
        if persisted.decrement(product_id).is_none() {
            return Err(CartError::UnknownProduct(product_id.clone()));
        }
        self.write_persisted(&persisted).await;

        // A quarantined line has no store counterpart; republish it from
        // the cached entry so both sides agree on the new quantity.
        let action = if self.store.snapshot().line(product_id).is_some() {
            CartAction::Decrement {
                product_id: product_id.clone(),
            }
        } else {
            match merge_line(&persisted, &self.store.snapshot(), product_id) {
                Some(line) => CartAction::Merge { line },
                None => CartAction::Decrement {
                    product_id: product_id.clone(),
                },
            }
        };
        let snapshot = self.store.apply(&action);

        self.push_remote(&snapshot).await;
        Ok(snapshot)
    }

    /// Full reconciliation: read the persisted cart, resolve every line's
    /// display data in parallel, and replace the reactive snapshot
    /// wholesale.
    ///
    /// When no persisted cart exists (fresh device), the server-side cart is
    /// fetched and adopted first, so a signed-in user sees the cart they
    /// left on another device. An existing persisted cart always wins over
    /// the remote one.
    ///
    /// Lines whose catalog lookup fails stay persisted but are reported in
    /// the snapshot's `quarantined` list instead of being silently dropped.
    ///
    /// Returns `Ok(None)` when a newer operation landed while display data
    /// was being resolved; the stale result is discarded.
    ///
    /// # Errors
    ///
    /// Currently infallible beyond the absorbed cache/catalog degradations;
    /// the `Result` keeps the signature uniform with the other operations.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn load_cart(&self) -> Result<Option<CartSnapshot>, CartError> {
        let (generation, persisted) = {
            let _gate = self.gate.lock().await;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (generation, self.read_persisted().await)
        };

        let persisted = if persisted.is_empty() {
            match self.remote.fetch().await {
                Ok(items) if !items.is_empty() => {
                    let adopted = adopt_remote(items);
                    let _gate = self.gate.lock().await;
                    if self.generation.load(Ordering::SeqCst) != generation {
                        debug!("discarding stale remote cart adoption");
                        return Ok(None);
                    }
                    self.write_persisted(&adopted).await;
                    adopted
                }
                Ok(_) => persisted,
                Err(err) => {
                    warn!(error = %err, "remote cart fetch failed, starting empty");
                    persisted
                }
            }
        } else {
            persisted
        };

        // Resolve outside the lock; mutations may land meanwhile, in which
        // case the generation check below discards this result.
        let mut tasks = tokio::task::JoinSet::new();
        for (product_id, entry) in persisted.entries {
            let catalog = Arc::clone(&self.catalog);
            tasks.spawn(async move {
                let resolved = catalog.product(&product_id).await;
                (product_id, entry, resolved)
            });
        }

        let mut lines: BTreeMap<ProductId, CartLine> = BTreeMap::new();
        let mut quarantined = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((product_id, entry, Ok(product))) => {
                    lines.insert(
                        product_id.clone(),
                        CartLine {
                            product_id,
                            title: product.title,
                            price: product.price,
                            quantity: entry.quantity,
                            image: product.image,
                        },
                    );
                }
                Ok((product_id, _entry, Err(err))) => {
                    warn!(product = %product_id, error = %err, "quarantining unresolvable cart line");
                    quarantined.push(product_id);
                }
                Err(err) => {
                    warn!(error = %err, "catalog resolution task failed");
                }
            }
        }
        quarantined.sort();

        let snapshot = CartSnapshot {
            lines: lines.into_values().collect(),
            quarantined,
        };

        let _gate = self.gate.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("discarding stale cart reconciliation");
            return Ok(None);
        }
        Ok(Some(self.store.apply(&CartAction::Replace { snapshot })))
    }

    /// Create an order from the current snapshot, then clear the durable
    /// cart, the reactive store, and (best effort) the server-side cart.
    ///
    /// Holds the per-user lock for the whole cycle so a concurrent mutation
    /// cannot slip between drafting the order and clearing the cart.
    ///
    /// # Errors
    ///
    /// [`CartError::EmptyCart`] when there is nothing to check out;
    /// [`CartError::Unresolved`] when the last reconciliation quarantined
    /// lines, since those would be dropped from the order and then wiped
    /// with the cart; [`CartError::Checkout`] with the service's message
    /// when order creation fails; the cart is left untouched so the user
    /// can retry.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn checkout(&self) -> Result<OrderId, CartError> {
        let _gate = self.gate.lock().await;

        let snapshot = self.store.snapshot();
        if snapshot.is_empty() && snapshot.quarantined.is_empty() {
            return Err(CartError::EmptyCart);
        }
        if !snapshot.quarantined.is_empty() {
            return Err(CartError::Unresolved(snapshot.quarantined));
        }

        let draft = OrderDraft {
            items: snapshot
                .lines
                .iter()
                .map(|line| OrderLine {
                    product_id: line.product_id.clone(),
                    title: line.title.clone(),
                    price: line.price,
                    quantity: line.quantity,
                    image: line.image.clone(),
                })
                .collect(),
        };

        let order_id = self
            .orders
            .create(&draft, Uuid::new_v4())
            .await
            .map_err(|err| CartError::Checkout(err.to_string()))?;

        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.storage.remove(&self.cart_key()).await {
            warn!(error = %err, "failed to clear durable cart after checkout");
        }
        let cleared = self.store.apply(&CartAction::Clear);
        self.push_remote(&cleared).await;
        Ok(order_id)
    }
}

/// Turn a fetched server-side cart into the persisted format. Images are
/// not on the cart wire; the next reconciliation fills them in from the
/// catalog.
fn adopt_remote(items: Vec<RemoteCartLine>) -> PersistedCart {
    let mut cart = PersistedCart::empty();
    for item in items {
        if item.count == 0 {
            continue;
        }
        let product_id = item.product_id();
        let price = item.unit_price();
        cart.insert(
            product_id,
            PersistedLine {
                quantity: item.count,
                title: item.title,
                price,
                image: String::new(),
            },
        );
    }
    cart
}

/// Build the merge line that brings a product's displayed quantity up to
/// its persisted quantity, from the display fields cached at add time.
///
/// For a line the store already shows this is the mutation's delta; for a
/// line the store lacks (quarantined) it is the full persisted quantity, so
/// one merge reconverges both sides.
fn merge_line(
    persisted: &PersistedCart,
    shown: &CartSnapshot,
    product_id: &ProductId,
) -> Option<CartLine> {
    let entry = persisted.entries.get(product_id)?;
    let displayed = shown.line(product_id).map_or(0, |line| line.quantity);
    Some(CartLine {
        product_id: product_id.clone(),
        title: entry.title.clone(),
        price: entry.price,
        quantity: entry.quantity.saturating_sub(displayed),
        image: entry.image.clone(),
    })
}
