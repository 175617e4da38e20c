//! Order lifecycle manager.
//!
//! Orders move new → paid → delivered, one step at a time. Unlike the cart,
//! order state is server-authoritative: a transition sends the status update
//! and then re-fetches the full list instead of mutating locally, so the
//! client can never invent an order state the backend does not have.
//!
//! Transitions are still guarded locally: `mark_delivered` on an unpaid
//! order is rejected before any network call, because the backend is
//! lenient and would happily record the unreachable flag pair.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{instrument, warn};

use marketbag_core::{Order, OrderId, OrderStatus, UserId};

use crate::error::OrderError;
use crate::services::OrderApi;
use crate::storage::{KeyValueStore, StorageKey, get_typed, put_typed};

/// The fetched order list, classified by derived status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    /// All orders, in backend order.
    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Orders whose derived state equals `status`.
    pub fn by_status(&self, status: OrderStatus) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(move |o| o.status == status)
    }

    /// Number of orders in one lifecycle bucket (badge counts, headers).
    #[must_use]
    pub fn count_by_status(&self, status: OrderStatus) -> usize {
        self.by_status(status).count()
    }

    /// Look up an order by id.
    #[must_use]
    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }
}

/// Tracks one user's orders and drives their status transitions.
pub struct OrderLifecycle {
    user_id: UserId,
    api: Arc<dyn OrderApi>,
    storage: Arc<dyn KeyValueStore>,
    book: Arc<watch::Sender<OrderBook>>,
}

impl OrderLifecycle {
    /// Create a lifecycle manager for `user_id`.
    #[must_use]
    pub fn new(user_id: UserId, api: Arc<dyn OrderApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        let (book, _rx) = watch::channel(OrderBook::default());
        Self {
            user_id,
            api,
            storage,
            book: Arc::new(book),
        }
    }

    /// The current order book.
    #[must_use]
    pub fn book(&self) -> OrderBook {
        self.book.borrow().clone()
    }

    /// Subscribe to order book changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrderBook> {
        self.book.subscribe()
    }

    /// Shorthand for [`OrderBook::count_by_status`] on the current book.
    #[must_use]
    pub fn count_by_status(&self, status: OrderStatus) -> usize {
        self.book.borrow().count_by_status(status)
    }

    fn orders_key(&self) -> StorageKey {
        StorageKey::Orders(self.user_id.clone())
    }

    /// Fetch the order list from the backend, publish it, and mirror it to
    /// the durable cache for offline display.
    ///
    /// # Errors
    ///
    /// Returns the service error; the previously published book is kept.
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn refresh(&self) -> Result<OrderBook, OrderError> {
        let orders = self.api.list().await?;
        let book = OrderBook { orders };
        self.book.send_replace(book.clone());

        if let Err(err) = put_typed(self.storage.as_ref(), &self.orders_key(), &book.orders).await {
            warn!(error = %err, "failed to mirror orders to durable cache");
        }
        Ok(book)
    }

    /// Load the last mirrored order list from the durable cache, for
    /// display before the first refresh completes (or offline).
    #[instrument(skip(self), fields(user = %self.user_id))]
    pub async fn load_cached(&self) -> OrderBook {
        match get_typed::<Vec<Order>>(self.storage.as_ref(), &self.orders_key()).await {
            Ok(Some(orders)) => {
                let book = OrderBook { orders };
                self.book.send_replace(book.clone());
                book
            }
            Ok(None) => OrderBook::default(),
            Err(err) => {
                warn!(error = %err, "failed to read mirrored orders, starting empty");
                OrderBook::default()
            }
        }
    }

    /// Request the new → paid transition.
    ///
    /// # Errors
    ///
    /// [`OrderError::InvalidTransition`] when the order is not `new`,
    /// checked before any network call; service errors otherwise.
    pub async fn mark_paid(&self, id: &OrderId) -> Result<OrderBook, OrderError> {
        self.transition(id, OrderStatus::Paid).await
    }

    /// Request the paid → delivered transition.
    ///
    /// # Errors
    ///
    /// [`OrderError::InvalidTransition`] when the order is not `paid`,
    /// checked before any network call; service errors otherwise.
    pub async fn mark_delivered(&self, id: &OrderId) -> Result<OrderBook, OrderError> {
        self.transition(id, OrderStatus::Delivered).await
    }

    #[instrument(skip(self), fields(user = %self.user_id, order = %id, %requested))]
    async fn transition(
        &self,
        id: &OrderId,
        requested: OrderStatus,
    ) -> Result<OrderBook, OrderError> {
        let current = self
            .book
            .borrow()
            .order(id)
            .map(|order| order.status)
            .ok_or_else(|| OrderError::UnknownOrder(id.clone()))?;

        if current.next() != Some(requested) {
            return Err(OrderError::InvalidTransition {
                id: id.clone(),
                from: current,
                requested,
            });
        }

        self.api.update_status(id, requested).await?;
        // Order state is server-authoritative: no optimistic local mutation,
        // re-fetch and reclassify instead.
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use marketbag_core::Price;

    use crate::storage::MemoryStore;
    use crate::testkit::ScriptedOrderService;

    use super::*;

    fn order(id: &str, status: OrderStatus) -> Order {
        let (is_paid, is_delivered) = status.flags();
        Order::from_flags(
            OrderId::new(id),
            vec![],
            Price::from_cents(1000),
            is_paid,
            is_delivered,
        )
        .unwrap()
    }

    struct Fixture {
        api: Arc<ScriptedOrderService>,
        storage: Arc<MemoryStore>,
        lifecycle: OrderLifecycle,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(ScriptedOrderService::new());
        let storage = Arc::new(MemoryStore::new());
        let lifecycle = OrderLifecycle::new(
            UserId::new("u-1"),
            Arc::clone(&api) as Arc<dyn OrderApi>,
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
        );
        Fixture {
            api,
            storage,
            lifecycle,
        }
    }

    #[tokio::test]
    async fn classifies_orders_into_buckets() {
        let f = fixture();
        f.api.push_order(order("1", OrderStatus::New)).await;
        f.api.push_order(order("2", OrderStatus::Paid)).await;

        let book = f.lifecycle.refresh().await.unwrap();
        assert_eq!(book.count_by_status(OrderStatus::New), 1);
        assert_eq!(book.count_by_status(OrderStatus::Paid), 1);
        assert_eq!(book.count_by_status(OrderStatus::Delivered), 0);
    }

    #[tokio::test]
    async fn mark_paid_transitions_and_reclassifies() {
        let f = fixture();
        f.api.push_order(order("1", OrderStatus::New)).await;
        f.api.push_order(order("2", OrderStatus::Paid)).await;
        f.lifecycle.refresh().await.unwrap();

        let book = f.lifecycle.mark_paid(&OrderId::new("1")).await.unwrap();
        assert_eq!(book.count_by_status(OrderStatus::New), 0);
        assert_eq!(book.count_by_status(OrderStatus::Paid), 2);
        assert_eq!(book.count_by_status(OrderStatus::Delivered), 0);
    }

    #[tokio::test]
    async fn mark_delivered_on_new_order_is_rejected_before_the_network() {
        let f = fixture();
        f.api.push_order(order("1", OrderStatus::New)).await;
        f.lifecycle.refresh().await.unwrap();

        let err = f
            .lifecycle
            .mark_delivered(&OrderId::new("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
        assert_eq!(f.api.update_calls(), 0, "no network call may be issued");
        assert_eq!(f.lifecycle.count_by_status(OrderStatus::New), 1);
    }

    #[tokio::test]
    async fn full_lifecycle_passes_through_paid() {
        let f = fixture();
        f.api.push_order(order("1", OrderStatus::New)).await;
        f.lifecycle.refresh().await.unwrap();

        f.lifecycle.mark_paid(&OrderId::new("1")).await.unwrap();
        let book = f
            .lifecycle
            .mark_delivered(&OrderId::new("1"))
            .await
            .unwrap();
        assert_eq!(book.count_by_status(OrderStatus::Delivered), 1);

        // Delivered is terminal.
        let err = f.lifecycle.mark_paid(&OrderId::new("1")).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_order_is_rejected() {
        let f = fixture();
        let err = f.lifecycle.mark_paid(&OrderId::new("404")).await.unwrap_err();
        assert!(matches!(err, OrderError::UnknownOrder(_)));
    }

    #[tokio::test]
    async fn refresh_mirrors_orders_for_offline_display() {
        let f = fixture();
        f.api.push_order(order("1", OrderStatus::Paid)).await;
        f.lifecycle.refresh().await.unwrap();

        // A fresh manager over the same storage sees the mirror.
        let offline = OrderLifecycle::new(
            UserId::new("u-1"),
            Arc::new(ScriptedOrderService::new()) as Arc<dyn OrderApi>,
            Arc::clone(&f.storage) as Arc<dyn KeyValueStore>,
        );
        let book = offline.load_cached().await;
        assert_eq!(book.count_by_status(OrderStatus::Paid), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_book() {
        let f = fixture();
        f.api.push_order(order("1", OrderStatus::New)).await;
        f.lifecycle.refresh().await.unwrap();

        f.api.set_fail_list(true);
        assert!(f.lifecycle.refresh().await.is_err());
        assert_eq!(f.lifecycle.count_by_status(OrderStatus::New), 1);
    }
}
