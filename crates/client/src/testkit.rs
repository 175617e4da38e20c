//! Scripted collaborator doubles for exercising the synchronization core.
//!
//! Compiled for this crate's own tests and, behind the `testkit` feature,
//! for downstream test crates. Nothing here performs I/O.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use marketbag_core::{Order, OrderId, OrderStatus, Price, ProductId};

use crate::error::{ApiError, CatalogError, RemoteCartError, RemoteOrderError};
use crate::services::{CartApi, CatalogApi, CatalogProduct, OrderApi, OrderDraft, RemoteCartLine};

fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "scripted failure".to_string(),
    }
}

/// Catalog double backed by a fixed product table.
#[derive(Default)]
pub struct ScriptedCatalog {
    products: Mutex<HashMap<ProductId, CatalogProduct>>,
    failing: Mutex<HashSet<ProductId>>,
    delay: Mutex<Option<Duration>>,
    lookups: AtomicU32,
}

impl ScriptedCatalog {
    /// Build a catalog from `(id, title, price_cents)` tuples.
    #[must_use]
    pub fn with_products<'a>(products: impl IntoIterator<Item = (&'a str, &'a str, i64)>) -> Self {
        let table = products
            .into_iter()
            .map(|(id, title, cents)| {
                let id = ProductId::new(id);
                let product = CatalogProduct {
                    id: id.clone(),
                    title: title.to_string(),
                    price: Price::from_cents(cents),
                    image: format!("https://img.example/{id}.png"),
                    description: String::new(),
                    rating: None,
                };
                (id, product)
            })
            .collect();
        Self {
            products: Mutex::new(table),
            ..Self::default()
        }
    }

    /// Make lookups for one product fail from now on.
    pub fn set_fail_for(&self, id: &str) {
        self.failing
            .try_lock()
            .expect("no concurrent scripting")
            .insert(ProductId::new(id));
    }

    /// Delay every lookup, to widen race windows in tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.try_lock().expect("no concurrent scripting") = Some(delay);
    }

    /// Number of lookups that reached the double (i.e. missed a cache).
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for ScriptedCatalog {
    async fn product(&self, id: &ProductId) -> Result<CatalogProduct, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().await.contains(id) {
            return Err(CatalogError {
                product_id: id.clone(),
                source: unavailable(),
            });
        }
        self.products
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError {
                product_id: id.clone(),
                source: ApiError::Status {
                    status: 404,
                    body: "no such product".to_string(),
                },
            })
    }
}

/// Remote cart double recording every replace.
#[derive(Default)]
pub struct ScriptedCartService {
    items: Mutex<Vec<RemoteCartLine>>,
    replaced: Mutex<Vec<Vec<RemoteCartLine>>>,
    fail: AtomicBool,
}

impl ScriptedCartService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail from now on.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Seed the server-side cart returned by `fetch`.
    pub async fn set_items(&self, items: Vec<RemoteCartLine>) {
        *self.items.lock().await = items;
    }

    /// Every payload passed to `replace`, oldest first.
    pub async fn replaced(&self) -> Vec<Vec<RemoteCartLine>> {
        self.replaced.lock().await.clone()
    }
}

#[async_trait]
impl CartApi for ScriptedCartService {
    async fn fetch(&self) -> Result<Vec<RemoteCartLine>, RemoteCartError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteCartError::Api(unavailable()));
        }
        Ok(self.items.lock().await.clone())
    }

    async fn replace(&self, items: &[RemoteCartLine]) -> Result<(), RemoteCartError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteCartError::Api(unavailable()));
        }
        *self.items.lock().await = items.to_vec();
        self.replaced.lock().await.push(items.to_vec());
        Ok(())
    }
}

/// Order service double with an in-memory order table.
///
/// Deliberately as lenient as the real backend: `update_status` applies
/// whatever it is asked, so tests can verify the client rejects invalid
/// transitions locally instead of relying on the server.
#[derive(Default)]
pub struct ScriptedOrderService {
    orders: Mutex<Vec<Order>>,
    next_id: AtomicU32,
    fail_create: Mutex<Option<String>>,
    fail_list: AtomicBool,
    update_calls: AtomicU32,
}

impl ScriptedOrderService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create` fail with the given message.
    pub fn set_fail_create(&self, message: &str) {
        *self
            .fail_create
            .try_lock()
            .expect("no concurrent scripting") = Some(message.to_string());
    }

    /// Make `list` fail from now on.
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Seed an existing order.
    pub async fn push_order(&self, order: Order) {
        self.orders.lock().await.push(order);
    }

    /// Current order table.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.lock().await.clone()
    }

    /// Number of `update_status` calls that reached the double.
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderApi for ScriptedOrderService {
    async fn create(
        &self,
        draft: &OrderDraft,
        _idempotency_key: Uuid,
    ) -> Result<OrderId, RemoteOrderError> {
        if let Some(message) = self.fail_create.lock().await.clone() {
            return Err(RemoteOrderError::Rejected(message));
        }

        let id = OrderId::new(format!(
            "order-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        let total: Price = draft
            .items
            .iter()
            .map(|item| item.price.times(item.quantity))
            .sum();
        let order = Order::from_flags(id.clone(), draft.items.clone(), total, false, false)
            .map_err(|e| RemoteOrderError::Malformed(e.to_string()))?;
        self.orders.lock().await.push(order);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<Order>, RemoteOrderError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RemoteOrderError::Api(unavailable()));
        }
        Ok(self.orders.lock().await.clone())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), RemoteOrderError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|order| &order.id == id)
            .ok_or_else(|| RemoteOrderError::Rejected(format!("no such order {id}")))?;
        order.status = status;
        Ok(())
    }
}
