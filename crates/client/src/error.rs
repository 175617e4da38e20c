//! Error taxonomy for the synchronization core.
//!
//! Propagation policy:
//! - durable-cache errors ([`CacheError`]) are absorbed where possible
//!   (reads degrade to an empty cart, writes warn and continue);
//! - catalog errors ([`CatalogError`]) quarantine the affected line during
//!   reconciliation and only fail an operation that cannot proceed without
//!   the product data;
//! - remote cart sync errors ([`RemoteCartError`]) are surfaced but never
//!   roll back a local mutation;
//! - checkout failures ([`CartError::Checkout`]) are fatal to that attempt
//!   only and leave the cart untouched;
//! - invalid order transitions ([`OrderError::InvalidTransition`]) are
//!   rejected locally before any network call.
//!
//! Nothing in this crate panics on a failed collaborator.

use marketbag_core::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Transport-level failure talking to any backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the connection failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend asked us to back off; value is the `Retry-After` in seconds.
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Durable key-value cache failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend reported itself unusable (corrupt store, missing directory).
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// A product's display data could not be resolved.
#[derive(Debug, Error)]
#[error("catalog unavailable for product {product_id}: {source}")]
pub struct CatalogError {
    pub product_id: ProductId,
    #[source]
    pub source: ApiError,
}

/// The remote cart service rejected or failed a read/replace.
#[derive(Debug, Error)]
pub enum RemoteCartError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Service answered with a non-`OK` status payload.
    #[error("cart service rejected the request: {0}")]
    Rejected(String),
}

/// The order service rejected or failed a request.
#[derive(Debug, Error)]
pub enum RemoteOrderError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Service answered with a non-`OK` status payload.
    #[error("order service rejected the request: {0}")]
    Rejected(String),

    /// A returned order record could not be decoded into a valid order.
    #[error("malformed order record: {0}")]
    Malformed(String),
}

/// Failures surfaced by cart synchronizer operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Checkout was attempted on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Increment/decrement on a product that is not in the cart.
    #[error("product {0} is not in the cart")]
    UnknownProduct(ProductId),

    /// A new line could not be created because its product data is missing.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Checkout was attempted while some lines were still quarantined;
    /// those lines would be silently dropped from the order.
    #[error("{} cart line(s) have unresolved product data", .0.len())]
    Unresolved(Vec<ProductId>),

    /// Order creation failed; the local cart is preserved for retry.
    #[error("checkout failed: {0}")]
    Checkout(String),

    /// Durable cache failure that could not be absorbed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Failures surfaced by order lifecycle operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Requested transition skips or reverses a lifecycle step.
    #[error("order {id}: cannot go from {from} to {requested}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        requested: OrderStatus,
    },

    /// Transition was requested for an order the client does not know.
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error(transparent)]
    Service(#[from] RemoteOrderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_both_states() {
        let err = OrderError::InvalidTransition {
            id: OrderId::new("7"),
            from: OrderStatus::New,
            requested: OrderStatus::Delivered,
        };
        assert_eq!(err.to_string(), "order 7: cannot go from new to delivered");
    }

    #[test]
    fn checkout_error_carries_service_message() {
        let err = CartError::Checkout("card declined".to_string());
        assert_eq!(err.to_string(), "checkout failed: card declined");
    }
}
