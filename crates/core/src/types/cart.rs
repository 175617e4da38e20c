//! Cart data: display lines, snapshots, and the durable on-device format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A single cart line as shown to the user.
///
/// Invariant: `quantity` is always at least 1. A quantity that would reach
/// zero removes the line instead; zero-quantity lines are never stored or
/// displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    pub price: Price,
    pub quantity: u32,
    pub image: String,
}

impl CartLine {
    /// Price of this line (`price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// The in-memory cart snapshot consumed by presentation layers.
///
/// `lines` holds at most one entry per product id. `quarantined` lists
/// products that have a persisted quantity but whose display data could not
/// be resolved during the last reconciliation; they are excluded from the
/// totals but reported so the failure is never silent.
///
/// Totals are recomputed on demand, never stored, so they cannot drift from
/// the lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub quarantined: Vec<ProductId>,
}

impl CartSnapshot {
    /// An empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there are no visible lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of items across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Total cost across all lines.
    #[must_use]
    pub fn total_cost(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Look up a line by product id.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product_id == product_id)
    }
}

/// One entry of the durable per-user cart.
///
/// Display fields are cached at add time so mutations can be pushed to the
/// remote cart service without re-fetching the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLine {
    pub quantity: u32,
    pub title: String,
    pub price: Price,
    pub image: String,
}

/// The durable per-user cart: product id mapped to quantity plus cached
/// display fields.
///
/// This is the JSON shape stored under the `cart-<userId>` key; an absent
/// product id means quantity zero. A `BTreeMap` keeps the on-disk and
/// reconciled ordering stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedCart {
    pub entries: BTreeMap<ProductId, PersistedLine>,
}

impl PersistedCart {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no products are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Quantity stored for a product (zero when absent).
    #[must_use]
    pub fn quantity(&self, product_id: &ProductId) -> u32 {
        self.entries.get(product_id).map_or(0, |line| line.quantity)
    }

    /// Merge `delta` units into an existing entry. Returns `false` when the
    /// product is not in the cart (callers must create the entry with its
    /// display fields first).
    pub fn merge(&mut self, product_id: &ProductId, delta: u32) -> bool {
        match self.entries.get_mut(product_id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(delta);
                true
            }
            None => false,
        }
    }

    /// Insert a new entry with its cached display fields.
    pub fn insert(&mut self, product_id: ProductId, line: PersistedLine) {
        self.entries.insert(product_id, line);
    }

    /// Remove one unit; entries reaching zero are deleted. Returns the new
    /// quantity, or `None` when the product was not in the cart.
    pub fn decrement(&mut self, product_id: &ProductId) -> Option<u32> {
        let line = self.entries.get_mut(product_id)?;
        if line.quantity <= 1 {
            self.entries.remove(product_id);
            Some(0)
        } else {
            line.quantity -= 1;
            Some(line.quantity)
        }
    }

    /// The set of (product id, quantity) pairs, for coherence checks.
    #[must_use]
    pub fn quantities(&self) -> BTreeMap<ProductId, u32> {
        self.entries
            .iter()
            .map(|(id, line)| (id.clone(), line.quantity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, cents: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            title: format!("Product {id}"),
            price: Price::from_cents(cents),
            quantity,
            image: format!("https://img.example/{id}.png"),
        }
    }

    #[test]
    fn totals_recompute_from_lines() {
        let snapshot = CartSnapshot {
            lines: vec![line("p1", 500, 2), line("p2", 1250, 1)],
            quarantined: vec![],
        };
        assert_eq!(snapshot.total_items(), 3);
        assert_eq!(snapshot.total_cost(), Price::from_cents(2250));
    }

    #[test]
    fn quarantined_lines_do_not_count() {
        let snapshot = CartSnapshot {
            lines: vec![line("p1", 500, 2)],
            quarantined: vec![ProductId::new("p2")],
        };
        assert_eq!(snapshot.total_items(), 2);
    }

    #[test]
    fn persisted_decrement_prunes_at_zero() {
        let mut cart = PersistedCart::empty();
        let id = ProductId::new("p1");
        cart.insert(
            id.clone(),
            PersistedLine {
                quantity: 2,
                title: "Product p1".to_string(),
                price: Price::from_cents(100),
                image: String::new(),
            },
        );

        assert_eq!(cart.decrement(&id), Some(1));
        assert_eq!(cart.decrement(&id), Some(0));
        assert!(cart.is_empty());
        assert_eq!(cart.decrement(&id), None);
    }

    #[test]
    fn persisted_cart_round_trips_wire_shape() {
        let mut cart = PersistedCart::empty();
        cart.insert(
            ProductId::new("3"),
            PersistedLine {
                quantity: 2,
                title: "Mens Cotton Jacket".to_string(),
                price: Price::from_cents(5599),
                image: "https://img.example/3.png".to_string(),
            },
        );

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["3"]["quantity"], 2);

        let back: PersistedCart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
