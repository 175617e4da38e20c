//! Orders and their lifecycle status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{OrderId, ProductId};
use super::price::Price;

/// Derived order lifecycle state.
///
/// The backend stores two flags, `is_paid` and `is_delivered`; the client
/// derives one of three states from them. Transitions are monotonic:
/// new → paid → delivered, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Paid,
    Delivered,
}

impl OrderStatus {
    /// Derive the status from the backend's flag pair.
    ///
    /// Returns `None` for the unreachable `(paid=false, delivered=true)`
    /// combination.
    #[must_use]
    pub const fn from_flags(is_paid: bool, is_delivered: bool) -> Option<Self> {
        match (is_paid, is_delivered) {
            (false, false) => Some(Self::New),
            (true, false) => Some(Self::Paid),
            (true, true) => Some(Self::Delivered),
            (false, true) => None,
        }
    }

    /// The backend flag pair for this status.
    #[must_use]
    pub const fn flags(self) -> (bool, bool) {
        match self {
            Self::New => (false, false),
            Self::Paid => (true, false),
            Self::Delivered => (true, true),
        }
    }

    /// The single legal successor state, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Paid),
            Self::Paid => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::Paid => "paid",
            Self::Delivered => "delivered",
        };
        f.write_str(label)
    }
}

/// Rejected flag combination on an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order flags (is_paid={is_paid}, is_delivered={is_delivered}) are not a valid status")]
pub struct InvalidStatusFlags {
    pub is_paid: bool,
    pub is_delivered: bool,
}

/// One purchased line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub price: Price,
    pub quantity: u32,
    pub image: String,
}

/// An order as tracked by the client.
///
/// Status is validated at construction, so `(paid=false, delivered=true)`
/// records are rejected at the decoding edge and never circulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<OrderLine>,
    pub total_price: Price,
    pub status: OrderStatus,
}

impl Order {
    /// Build an order from backend flags, rejecting the invalid combination.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatusFlags`] for `(is_paid=false, is_delivered=true)`.
    pub fn from_flags(
        id: OrderId,
        items: Vec<OrderLine>,
        total_price: Price,
        is_paid: bool,
        is_delivered: bool,
    ) -> Result<Self, InvalidStatusFlags> {
        let status = OrderStatus::from_flags(is_paid, is_delivered).ok_or(InvalidStatusFlags {
            is_paid,
            is_delivered,
        })?;
        Ok(Self {
            id,
            items,
            total_price,
            status,
        })
    }
}
