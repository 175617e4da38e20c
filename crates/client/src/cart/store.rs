//! In-memory reactive cart snapshot.
//!
//! The store holds one [`CartSnapshot`] behind a `tokio::sync::watch`
//! channel. Consumers observe the snapshot; only the cart synchronizer
//! applies transitions, and it does so while holding its per-user lock, so
//! the single-writer rule is upheld by construction.
//!
//! Transitions are pure: `reduce(old, action)` builds the next snapshot
//! without touching the old one, and no transition can produce a line with
//! quantity zero or below.

use marketbag_core::{CartLine, CartSnapshot, ProductId};
use std::sync::Arc;
use tokio::sync::watch;

/// A transition applied to the cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add `line.quantity` units of a product, creating the line when new.
    /// Resolving a product also lifts it out of quarantine.
    Merge { line: CartLine },
    /// Remove one unit; a line reaching zero is pruned. The product also
    /// leaves quarantine, since the user has explicitly acted on it.
    Decrement { product_id: ProductId },
    /// Replace the snapshot wholesale (reconciliation).
    Replace { snapshot: CartSnapshot },
    /// Empty the cart (checkout success, sign-out).
    Clear,
}

/// Pure reducer: `(old snapshot, action) -> new snapshot`.
#[must_use]
pub fn reduce(snapshot: &CartSnapshot, action: &CartAction) -> CartSnapshot {
    match action {
        CartAction::Merge { line } => merge(snapshot, line),
        CartAction::Decrement { product_id } => decrement(snapshot, product_id),
        CartAction::Replace { snapshot: next } => next.clone(),
        CartAction::Clear => CartSnapshot::empty(),
    }
}

fn merge(snapshot: &CartSnapshot, incoming: &CartLine) -> CartSnapshot {
    // A zero-quantity merge must not create a zero line.
    if incoming.quantity == 0 {
        return snapshot.clone();
    }

    let mut next = snapshot.clone();
    next.quarantined.retain(|id| id != &incoming.product_id);

    match next
        .lines
        .iter_mut()
        .find(|line| line.product_id == incoming.product_id)
    {
        Some(line) => {
            line.quantity = line.quantity.saturating_add(incoming.quantity);
            // Display fields follow the latest resolution.
            line.title = incoming.title.clone();
            line.price = incoming.price;
            line.image = incoming.image.clone();
        }
        None => next.lines.push(incoming.clone()),
    }
    next
}

fn decrement(snapshot: &CartSnapshot, product_id: &ProductId) -> CartSnapshot {
    let mut next = snapshot.clone();
    next.quarantined.retain(|id| id != product_id);
    if let Some(position) = next
        .lines
        .iter()
        .position(|line| &line.product_id == product_id)
    {
        if let Some(line) = next.lines.get_mut(position) {
            if line.quantity > 1 {
                line.quantity -= 1;
            } else {
                next.lines.remove(position);
            }
        }
    }
    next
}

/// Observable holder of the current cart snapshot.
#[derive(Debug, Clone)]
pub struct CartStore {
    tx: Arc<watch::Sender<CartSnapshot>>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore {
    /// Create a store holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CartSnapshot::empty());
        Self { tx: Arc::new(tx) }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.tx.subscribe()
    }

    /// Apply a transition and publish the new snapshot.
    ///
    /// Crate-private: only the synchronizer writes, under its per-user lock.
    pub(crate) fn apply(&self, action: &CartAction) -> CartSnapshot {
        let next = reduce(&self.tx.borrow(), action);
        self.tx.send_replace(next.clone());
        next
    }
}
